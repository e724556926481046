use std::fmt;

use log::{info, warn};
use serde_json::Value;

use crate::config::SpecbindConfig;
use crate::error::{InvalidSpecification, ResolveError};
use crate::handler::{Handler, HandlerRegistry};
use crate::method::HttpMethod;
use crate::operation::{Operation, OperationContext};
use crate::parse::spec::SwaggerSpec;
use crate::security::SecurityStrategy;

/// Options controlling how a document is registered.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Overrides the document's `basePath`.
    pub base_path: Option<String>,
    /// Abort on the first invalid operation. When false, invalid operations
    /// are skipped and listed in [`Api::skipped`].
    pub strict: bool,
    /// Token info URL for `oauth2` schemes without `x-tokenInfoUrl`.
    pub token_info_url: Option<String>,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            strict: true,
            token_info_url: None,
        }
    }
}

impl From<&SpecbindConfig> for ApiOptions {
    fn from(config: &SpecbindConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            strict: config.strict,
            token_info_url: config.security.token_info_url.clone(),
        }
    }
}

/// An operation left out of a lenient registration.
#[derive(Debug, Clone)]
pub struct SkippedOperation {
    pub method: HttpMethod,
    pub path: String,
    pub error: InvalidSpecification,
}

/// Route registration: every valid [`Operation`] of a document, ready to be
/// bound to handlers.
#[derive(Debug, Clone)]
pub struct Api {
    title: String,
    version: String,
    base_path: String,
    operations: Vec<Operation>,
    skipped: Vec<SkippedOperation>,
}

impl Api {
    pub fn from_spec(spec: &SwaggerSpec, options: &ApiOptions) -> Result<Self, InvalidSpecification> {
        let ctx = OperationContext::from_spec(spec)
            .with_default_token_info_url(options.token_info_url.as_deref());

        let mut operations = Vec::new();
        let mut skipped = Vec::new();

        for (path, item) in &spec.paths {
            for (method, op) in item.operations() {
                let operation =
                    Operation::with_path_parameters(method, path, op, &item.parameters, &ctx);
                match operation.body_schema() {
                    Ok(_) => operations.push(operation),
                    Err(error) if options.strict => return Err(error),
                    Err(error) => {
                        warn!("skipping {method} {path}: {error}");
                        skipped.push(SkippedOperation {
                            method,
                            path: path.clone(),
                            error,
                        });
                    }
                }
            }
        }

        let base_path = options
            .base_path
            .clone()
            .or_else(|| spec.base_path.clone())
            .unwrap_or_default();

        info!(
            "registered {} operations for {} {} ({} skipped)",
            operations.len(),
            spec.info.title,
            spec.info.version,
            skipped.len()
        );

        Ok(Self {
            title: spec.info.title.clone(),
            version: spec.info.version.clone(),
            base_path,
            operations,
            skipped,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn skipped(&self) -> &[SkippedOperation] {
        &self.skipped
    }

    /// Find an operation by method and document path (without base path).
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.method() == method && op.path() == path)
    }

    /// Full route path of `path` under this API's base path.
    pub fn route_path(&self, path: &str) -> String {
        join_base_path(&self.base_path, path)
    }

    /// Bind a handler to every operation. Fails on the first operation whose
    /// `operationId` is missing or unregistered.
    pub fn bind(&self, registry: &HandlerRegistry) -> Result<Vec<Route>, ResolveError> {
        self.operations
            .iter()
            .map(|op| -> Result<Route, ResolveError> {
                let handler = op.resolve_function(registry)?;
                Ok(Route {
                    method: op.method(),
                    path: self.route_path(op.path()),
                    operation_id: op.operation_id().unwrap_or_default().to_string(),
                    handler,
                    security: op.security_strategy().clone(),
                    produces: op.produces().to_vec(),
                    consumes: op.consumes().to_vec(),
                    body_schema: op.body_schema()?.cloned(),
                })
            })
            .collect()
    }
}

/// An operation bound to its handler, ready for a router.
#[derive(Clone)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    pub operation_id: String,
    pub handler: Handler,
    pub security: SecurityStrategy,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    pub body_schema: Option<Value>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation_id", &self.operation_id)
            .field("security", &self.security)
            .field("produces", &self.produces)
            .field("consumes", &self.consumes)
            .field("body_schema", &self.body_schema)
            .finish_non_exhaustive()
    }
}

fn join_base_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
