use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use crate::error::{InvalidSpecification, ResolveError};
use crate::handler::{Handler, HandlerRegistry};
use crate::method::HttpMethod;
use crate::parse::operation::Operation as OperationSpec;
use crate::parse::parameter::{Parameter, ParameterLocation, ParameterOrRef};
use crate::parse::security::{SecurityRequirement, SecurityScheme};
use crate::parse::spec::SwaggerSpec;
use crate::security::{SecurityStrategy, select_strategy};

const DEFINITIONS_PREFIX: &str = "#/definitions/";
const PARAMETERS_PREFIX: &str = "#/parameters/";

/// Document-wide inputs shared by every operation of an API.
#[derive(Debug, Clone, Copy)]
pub struct OperationContext<'a> {
    pub app_produces: &'a [String],
    pub app_consumes: &'a [String],
    pub app_security: &'a [SecurityRequirement],
    pub security_definitions: &'a IndexMap<String, SecurityScheme>,
    pub definitions: &'a IndexMap<String, Value>,
    pub parameter_definitions: &'a IndexMap<String, Parameter>,
    /// Used for `oauth2` schemes that do not declare `x-tokenInfoUrl`.
    pub default_token_info_url: Option<&'a str>,
}

impl<'a> OperationContext<'a> {
    pub fn from_spec(spec: &'a SwaggerSpec) -> Self {
        Self {
            app_produces: &spec.produces,
            app_consumes: &spec.consumes,
            app_security: &spec.security,
            security_definitions: &spec.security_definitions,
            definitions: &spec.definitions,
            parameter_definitions: &spec.parameters,
            default_token_info_url: None,
        }
    }

    pub fn with_default_token_info_url(mut self, url: Option<&'a str>) -> Self {
        self.default_token_info_url = url;
        self
    }
}

/// A single (method, path) endpoint resolved against its enclosing document.
///
/// Everything is computed when the operation is built. Construction never
/// fails: problems with the document are kept and reported by
/// [`Operation::body_schema`], so a caller can decide whether to abort or skip
/// the route.
#[derive(Debug, Clone)]
pub struct Operation {
    method: HttpMethod,
    path: String,
    operation_id: Option<String>,
    summary: Option<String>,
    produces: Vec<String>,
    consumes: Vec<String>,
    security: Vec<SecurityRequirement>,
    security_strategy: SecurityStrategy,
    parameters: Result<Vec<Parameter>, InvalidSpecification>,
    body_schema: Result<Option<Value>, InvalidSpecification>,
}

impl Operation {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        operation: &OperationSpec,
        ctx: &OperationContext<'_>,
    ) -> Self {
        Self::with_path_parameters(method, path, operation, &[], ctx)
    }

    /// Build an operation that also inherits the path item's parameters.
    ///
    /// An operation parameter with the same `name` and `in` as a path
    /// parameter replaces it.
    pub fn with_path_parameters(
        method: HttpMethod,
        path: impl Into<String>,
        operation: &OperationSpec,
        path_parameters: &[ParameterOrRef],
        ctx: &OperationContext<'_>,
    ) -> Self {
        let path = path.into();
        let label = format!("{method} {path}");

        let produces = non_empty_or(operation.produces.as_deref(), ctx.app_produces);
        let consumes = non_empty_or(operation.consumes.as_deref(), ctx.app_consumes);
        let security = non_empty_or(operation.security.as_deref(), ctx.app_security);

        let security_strategy = select_strategy(
            &label,
            &security,
            ctx.security_definitions,
            ctx.default_token_info_url,
        );

        let parameters = merge_parameters(
            &label,
            path_parameters,
            &operation.parameters,
            ctx.parameter_definitions,
        );
        let body_schema = match &parameters {
            Ok(params) => resolve_body_schema(&label, params, ctx.definitions),
            Err(e) => Err(e.clone()),
        };

        debug!(
            "{label}: resolved operation (operationId={:?}, strategy={:?})",
            operation.operation_id, security_strategy
        );

        Self {
            method,
            path,
            operation_id: operation.operation_id.clone(),
            summary: operation.summary.clone(),
            produces,
            consumes,
            security,
            security_strategy,
            parameters,
            body_schema,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Response content types: the operation's own, or the API default.
    pub fn produces(&self) -> &[String] {
        &self.produces
    }

    /// Request content types: the operation's own, or the API default.
    pub fn consumes(&self) -> &[String] {
        &self.consumes
    }

    /// Effective security requirements: the operation's own, or the API default.
    pub fn security(&self) -> &[SecurityRequirement] {
        &self.security
    }

    pub fn security_strategy(&self) -> &SecurityStrategy {
        &self.security_strategy
    }

    /// Resolved parameters, path-level ones included.
    pub fn parameters(&self) -> Result<&[Parameter], InvalidSpecification> {
        self.parameters.as_deref().map_err(Clone::clone)
    }

    /// The dereferenced schema of the `body` parameter, if there is one.
    pub fn body_schema(&self) -> Result<Option<&Value>, InvalidSpecification> {
        match &self.body_schema {
            Ok(schema) => Ok(schema.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Look up the handler registered under this operation's `operationId`.
    pub fn resolve_function(&self, registry: &HandlerRegistry) -> Result<Handler, ResolveError> {
        let operation_id =
            self.operation_id
                .as_deref()
                .ok_or_else(|| ResolveError::MissingOperationId {
                    method: self.method.to_string(),
                    path: self.path.clone(),
                })?;
        registry.resolve(operation_id)
    }
}

fn non_empty_or<T: Clone>(own: Option<&[T]>, fallback: &[T]) -> Vec<T> {
    match own {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => fallback.to_vec(),
    }
}

fn merge_parameters(
    label: &str,
    path_parameters: &[ParameterOrRef],
    operation_parameters: &[ParameterOrRef],
    shared: &IndexMap<String, Parameter>,
) -> Result<Vec<Parameter>, InvalidSpecification> {
    let own = operation_parameters
        .iter()
        .map(|p| resolve_parameter(label, p, shared))
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = Vec::with_capacity(path_parameters.len() + own.len());
    for p in path_parameters {
        let inherited = resolve_parameter(label, p, shared)?;
        let overridden = own
            .iter()
            .any(|o| o.name == inherited.name && o.location == inherited.location);
        if !overridden {
            merged.push(inherited);
        }
    }
    merged.extend(own);
    Ok(merged)
}

fn resolve_parameter(
    label: &str,
    param: &ParameterOrRef,
    shared: &IndexMap<String, Parameter>,
) -> Result<Parameter, InvalidSpecification> {
    match param {
        ParameterOrRef::Parameter(p) => Ok(p.clone()),
        ParameterOrRef::Ref { ref_path } => {
            let name = ref_path.strip_prefix(PARAMETERS_PREFIX).ok_or_else(|| {
                InvalidSpecification::new(format!("{label} '$ref' needs to point to parameters"))
            })?;
            shared.get(name).cloned().ok_or_else(|| {
                InvalidSpecification::new(format!("{label} Parameter definition '{name}' not found"))
            })
        }
    }
}

fn resolve_body_schema(
    label: &str,
    parameters: &[Parameter],
    definitions: &IndexMap<String, Value>,
) -> Result<Option<Value>, InvalidSpecification> {
    let mut body = parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Body);
    let Some(param) = body.next() else {
        return Ok(None);
    };
    if body.next().is_some() {
        return Err(InvalidSpecification::new(format!(
            "{label} There can be one 'body' parameter at most"
        )));
    }

    let Some(schema) = &param.schema else {
        debug!("{label}: body parameter '{}' has no schema", param.name);
        return Ok(Some(Value::Object(Default::default())));
    };

    let Some(reference) = schema.get("$ref") else {
        return Ok(Some(schema.clone()));
    };

    // The double space is part of the message consumers match on.
    let name = reference
        .as_str()
        .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
        .ok_or_else(|| {
            InvalidSpecification::new(format!("{label}  '$ref' needs to to point to definitions"))
        })?;

    definitions
        .get(name)
        .cloned()
        .map(Some)
        .ok_or_else(|| InvalidSpecification::new(format!("{label} Definition '{name}' not found")))
}
