pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod method;
pub mod operation;
pub mod parse;
pub mod security;

pub use api::{Api, ApiOptions, Route};
pub use error::{InvalidSpecification, ResolveError};
pub use handler::{Handler, HandlerRegistry};
pub use method::HttpMethod;
pub use operation::{Operation, OperationContext};
pub use security::SecurityStrategy;
