use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::error::ResolveError;

/// A callable bound to an operation. Receives the validated request payload.
pub type Handler = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// An `operationId` split into its module path and function name.
///
/// `fakeapi.hello.post_greeting` has module `fakeapi.hello` and function
/// `post_greeting`. An id without dots has an empty module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef<'a> {
    pub module: &'a str,
    pub function: &'a str,
}

impl<'a> HandlerRef<'a> {
    pub fn parse(operation_id: &'a str) -> Self {
        match operation_id.rsplit_once('.') {
            Some((module, function)) => Self { module, function },
            None => Self {
                module: "",
                function: operation_id,
            },
        }
    }
}

/// Request handlers keyed by `operationId`.
///
/// Handlers are registered explicitly at startup; resolving an operation looks
/// its id up here.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `operation_id`, replacing any earlier entry.
    pub fn register<F>(&mut self, operation_id: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let operation_id = operation_id.into();
        let replaced = self
            .handlers
            .insert(operation_id.clone(), Arc::new(handler))
            .is_some();
        if replaced {
            warn!("replaced existing handler for operationId '{operation_id}'");
        } else {
            debug!("registered handler for operationId '{operation_id}'");
        }
    }

    pub fn get(&self, operation_id: &str) -> Option<&Handler> {
        self.handlers.get(operation_id)
    }

    /// Like [`get`](Self::get), but a missing handler is an error.
    pub fn resolve(&self, operation_id: &str) -> Result<Handler, ResolveError> {
        self.get(operation_id)
            .cloned()
            .ok_or_else(|| ResolveError::HandlerNotFound(operation_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("HandlerRegistry")
            .field("operation_ids", &ids)
            .finish()
    }
}
