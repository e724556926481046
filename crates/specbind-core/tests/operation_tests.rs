use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Value, json};

use specbind_core::parse::operation::Operation as OperationSpec;
use specbind_core::parse::parameter::Parameter;
use specbind_core::parse::security::{SecurityRequirement, SecurityScheme};
use specbind_core::{HandlerRegistry, HttpMethod, Operation, OperationContext, SecurityStrategy};

const TOKEN_INFO_URL: &str = "https://ouath.example/token_info";

fn definitions() -> IndexMap<String, Value> {
    let mut defs = IndexMap::new();
    defs.insert(
        "new_stack".to_string(),
        json!({
            "required": ["image_version", "keep_stacks", "new_traffic", "senza_yaml"],
            "type": "object",
            "properties": {
                "keep_stacks": { "type": "integer", "description": "Number of older stacks to keep" },
                "image_version": { "type": "string", "description": "Docker image version to deploy" },
                "senza_yaml": { "type": "string", "description": "YAML to provide to senza" },
                "new_traffic": { "type": "integer", "description": "Percentage of the traffic" }
            }
        }),
    );
    defs
}

fn operation_with_body_params(body_params: Vec<Value>) -> OperationSpec {
    serde_json::from_value(json!({
        "description": "Adds a new stack to be created by lizzy and returns the information needed to keep track of deployment",
        "operationId": "fakeapi.hello.post_greeting",
        "parameters": body_params,
        "responses": {
            "201": {
                "description": "Stack to be created.",
                "schema": { "$ref": "#/definitions/stack" }
            },
            "400": {
                "description": "Stack was not created because request was invalid",
                "schema": { "$ref": "#/definitions/problem" }
            }
        },
        "security": [{ "oauth": ["uid"] }],
        "summary": "Create new stack"
    }))
    .expect("operation fixture should deserialize")
}

fn body_param(reference: &str) -> Value {
    json!({
        "in": "body",
        "name": "new_stack",
        "required": true,
        "schema": { "$ref": reference }
    })
}

fn operation1() -> OperationSpec {
    operation_with_body_params(vec![body_param("#/definitions/new_stack")])
}

fn operation2() -> OperationSpec {
    operation_with_body_params(vec![
        body_param("#/definitions/new_stack"),
        body_param("#/definitions/new_stack"),
    ])
}

fn operation3() -> OperationSpec {
    operation_with_body_params(vec![body_param("#/notdefinitions/new_stack")])
}

fn security_definitions(with_token_info: bool) -> IndexMap<String, SecurityScheme> {
    let mut scheme = json!({
        "type": "oauth2",
        "flow": "password",
        "scopes": { "myscope": "can do stuff" }
    });
    if with_token_info {
        scheme["x-tokenInfoUrl"] = json!(TOKEN_INFO_URL);
    }
    let mut defs = IndexMap::new();
    defs.insert(
        "oauth".to_string(),
        serde_json::from_value(scheme).expect("scheme should deserialize"),
    );
    defs
}

struct Inputs {
    produces: Vec<String>,
    security: Vec<SecurityRequirement>,
    security_definitions: IndexMap<String, SecurityScheme>,
    definitions: IndexMap<String, Value>,
    parameters: IndexMap<String, Parameter>,
}

impl Inputs {
    fn new(
        security_definitions: IndexMap<String, SecurityScheme>,
        definitions: IndexMap<String, Value>,
    ) -> Self {
        Self {
            produces: vec!["application/json".to_string()],
            security: Vec::new(),
            security_definitions,
            definitions,
            parameters: IndexMap::new(),
        }
    }

    fn ctx(&self) -> OperationContext<'_> {
        OperationContext {
            app_produces: &self.produces,
            app_consumes: &[],
            app_security: &self.security,
            security_definitions: &self.security_definitions,
            definitions: &self.definitions,
            parameter_definitions: &self.parameters,
            default_token_info_url: None,
        }
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("fakeapi.hello.post_greeting", |body| json!({ "greeting": body }));
    registry
}

fn expected_security() -> Vec<SecurityRequirement> {
    let mut req = IndexMap::new();
    req.insert("oauth".to_string(), vec!["uid".to_string()]);
    vec![req]
}

#[test]
fn test_operation() {
    let inputs = Inputs::new(security_definitions(true), definitions());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());

    let handler = operation
        .resolve_function(&registry())
        .expect("handler should resolve");
    assert_eq!(handler(json!("hi")), json!({ "greeting": "hi" }));

    assert_eq!(
        operation.security_strategy(),
        &SecurityStrategy::OAuth {
            token_info_url: TOKEN_INFO_URL.to_string(),
            scopes: BTreeSet::from(["uid".to_string()]),
        }
    );

    assert_eq!(operation.method(), HttpMethod::Get);
    assert_eq!(operation.path(), "endpoint");
    assert_eq!(operation.produces(), ["application/json".to_string()]);
    assert_eq!(operation.security(), expected_security().as_slice());
    assert_eq!(
        operation.body_schema().unwrap(),
        Some(&inputs.definitions["new_stack"])
    );
}

#[test]
fn test_non_existent_reference() {
    let inputs = Inputs::new(IndexMap::new(), IndexMap::new());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());

    let err = operation.body_schema().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"<InvalidSpecification: GET endpoint Definition 'new_stack' not found>");
    assert_eq!(
        format!("{err:?}"),
        "<InvalidSpecification: GET endpoint Definition 'new_stack' not found>"
    );
}

#[test]
fn test_multi_body() {
    let inputs = Inputs::new(IndexMap::new(), definitions());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation2(), &inputs.ctx());

    let err = operation.body_schema().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"<InvalidSpecification: GET endpoint There can be one 'body' parameter at most>");
    assert_eq!(format!("{err:?}"), err.to_string());
}

#[test]
fn test_invalid_reference() {
    let inputs = Inputs::new(IndexMap::new(), definitions());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation3(), &inputs.ctx());

    let err = operation.body_schema().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"<InvalidSpecification: GET endpoint  '$ref' needs to to point to definitions>");
    assert_eq!(format!("{err:?}"), err.to_string());
}

#[test]
fn test_no_token_info() {
    let mut inputs = Inputs::new(security_definitions(false), definitions());
    inputs.security = expected_security();
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());

    assert!(operation.resolve_function(&registry()).is_ok());
    assert_eq!(operation.security_strategy(), &SecurityStrategy::Passthrough);

    assert_eq!(operation.method(), HttpMethod::Get);
    assert_eq!(operation.produces(), ["application/json".to_string()]);
    assert_eq!(operation.security(), expected_security().as_slice());
    assert_eq!(
        operation.body_schema().unwrap(),
        Some(&inputs.definitions["new_stack"])
    );
}

#[test]
fn test_undefined_scheme_is_passthrough() {
    let inputs = Inputs::new(IndexMap::new(), definitions());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());
    assert_eq!(operation.security_strategy(), &SecurityStrategy::Passthrough);
}

#[test]
fn test_app_security_used_when_operation_has_none() {
    let mut inputs = Inputs::new(security_definitions(true), definitions());
    inputs.security = expected_security();
    let mut spec = operation1();
    spec.security = Some(Vec::new());

    let operation = Operation::new(HttpMethod::Post, "/stacks", &spec, &inputs.ctx());
    assert_eq!(operation.security(), expected_security().as_slice());
    assert!(operation.security_strategy().is_enforced());
}

#[test]
fn test_resolution_is_deterministic() {
    let inputs = Inputs::new(IndexMap::new(), IndexMap::new());
    let a = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());
    let b = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());
    assert_eq!(a.body_schema().unwrap_err(), b.body_schema().unwrap_err());
    assert_eq!(a.body_schema().unwrap_err(), a.body_schema().unwrap_err());
}

#[test]
fn test_unregistered_handler() {
    let inputs = Inputs::new(IndexMap::new(), definitions());
    let operation = Operation::new(HttpMethod::Get, "endpoint", &operation1(), &inputs.ctx());
    let err = operation
        .resolve_function(&HandlerRegistry::new())
        .err()
        .expect("lookup should fail");
    assert_eq!(
        err.to_string(),
        "no handler registered for operationId 'fakeapi.hello.post_greeting'"
    );
}
