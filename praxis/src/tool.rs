//! Tool trait and utilities for defining agent tools.
//!
//! Tools are the primary way agents interact with the world. Each tool
//! declares an ordered parameter list (converted to a JSON Schema when
//! advertised to a model) and an `execute` method that is total: any
//! failure surfaces through an errored [`ToolOutput`], never a panic.
//!
//! Agents implement [`Tool`] themselves, so agents compose as tools.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::arguments::Arguments;
use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::model::ToolDescriptor;
use crate::output::ToolOutput;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// A JSON integer.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ParameterKind {
    /// JSON-Schema type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Validator run against a supplied parameter value.
pub type ParameterValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A declared tool parameter.
#[derive(Clone)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// JSON type of the value.
    pub kind: ParameterKind,
    /// Description shown to the model.
    pub description: String,
    /// Whether the parameter must be supplied.
    pub required: bool,
    /// Default injected when the parameter is absent.
    pub default: Option<Value>,
    /// Optional validator for supplied values.
    pub validator: Option<ParameterValidator>,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("has_validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl Parameter {
    /// Create a parameter of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: false,
            default: None,
            validator: None,
        }
    }

    /// Create a string parameter.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String)
    }

    /// Create an integer parameter.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Integer)
    }

    /// Create a number parameter.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Number)
    }

    /// Create a boolean parameter.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Boolean)
    }

    /// Create an object parameter.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Object)
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the parameter as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set a default value injected when the parameter is absent.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach a validator for supplied values.
    #[must_use]
    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

/// Convert a declared parameter list into a JSON-Schema object.
#[must_use]
pub fn parameters_schema(parameters: &[Parameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for parameter in parameters {
        let mut prop = Map::new();
        prop.insert("type".to_owned(), Value::String(parameter.kind.as_str().to_owned()));
        if !parameter.description.is_empty() {
            prop.insert(
                "description".to_owned(),
                Value::String(parameter.description.clone()),
            );
        }
        if let Some(default) = &parameter.default {
            prop.insert("default".to_owned(), default.clone());
        }
        properties.insert(parameter.name.clone(), Value::Object(prop));
        if parameter.required {
            required.push(Value::String(parameter.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check supplied arguments against a declared parameter list.
///
/// Absent optional parameters with defaults are injected into `args`;
/// missing required parameters, type mismatches, and validator rejections
/// fail with a [`ToolError`]. Runs before dispatch, so a failing call never
/// reaches the tool.
pub fn validate_arguments(
    parameters: &[Parameter],
    args: &mut Arguments,
) -> Result<(), ToolError> {
    for parameter in parameters {
        let Some(value) = args.get_value(&parameter.name).cloned() else {
            if let Some(default) = &parameter.default {
                args.insert_value(&parameter.name, default.clone());
            } else if parameter.required {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required parameter '{}'",
                    parameter.name
                )));
            }
            continue;
        };

        if !value.is_null() && !parameter.kind.matches(&value) {
            return Err(ToolError::InvalidArguments(format!(
                "parameter '{}' expects {}, got {value}",
                parameter.name,
                parameter.kind.as_str()
            )));
        }
        if let Some(validator) = &parameter.validator {
            validator(&value).map_err(|message| ToolError::Validation {
                parameter: parameter.name.clone(),
                message,
            })?;
        }
    }
    Ok(())
}

/// The core trait for all tools that agents can use.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier; defaults to the name.
    fn id(&self) -> &str {
        self.name()
    }

    /// Name of the tool, unique within an agent's registry.
    fn name(&self) -> &str;

    /// What the tool does, shown to the model.
    fn description(&self) -> &str;

    /// Declared parameters, in advertisement order.
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Execute the tool.
    ///
    /// Total: failures are reported through the returned [`ToolOutput`].
    async fn execute(&self, ctx: &ExecutionContext, args: Arguments) -> ToolOutput;

    /// Descriptor advertised to models.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: parameters_schema(&self.parameters()),
        }
    }
}

/// A shared dynamic tool. `Arc` so an agent can hand itself out as a tool.
pub type BoxedTool = Arc<dyn Tool>;

/// A collection of tools addressable by name.
///
/// Backed by an ordered map, so [`descriptors`](Self::descriptors) comes
/// out sorted by name — completion requests are deterministic.
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolBox {
    /// Create a new empty toolbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any existing tool with the same name.
    pub fn add<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_owned(), Arc::new(tool));
    }

    /// Add a shared tool.
    pub fn add_shared(&mut self, tool: BoxedTool) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    /// Check if the toolbox contains a tool with the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all tools, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Descriptors of all tools, sorted by name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Number of tools in the toolbox.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the toolbox is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBox").field("tools", &self.names()).finish()
    }
}

/// Future returned by a [`FunctionTool`] handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolOutput> + Send>>;

type ToolHandler = dyn Fn(ExecutionContext, Arguments) -> ToolFuture + Send + Sync;

/// A tool backed by an async closure.
///
/// # Example
///
/// ```rust,ignore
/// let tool = FunctionTool::new(
///     "echo",
///     "Echoes back the message.",
///     vec![Parameter::string("message").required()],
///     |_ctx, args| async move {
///         ToolOutput::ok(args.get_str("message").unwrap_or_default())
///     },
/// );
/// ```
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
    handler: Box<ToolHandler>,
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FunctionTool {
    /// Create a tool from an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<Parameter>,
        handler: F,
    ) -> Self
    where
        F: Fn(ExecutionContext, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutput> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Box::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.parameters.clone()
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Arguments) -> ToolOutput {
        (self.handler)(ctx.clone(), args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool() -> FunctionTool {
        FunctionTool::new(
            "echo",
            "Echoes back the message.",
            vec![Parameter::string("message").required()],
            |_ctx, args| async move {
                ToolOutput::ok(args.get_str("message").unwrap_or_default())
            },
        )
    }

    mod schema {
        use super::*;

        #[test]
        fn includes_properties_and_required() {
            let params = vec![
                Parameter::string("city").description("City name").required(),
                Parameter::integer("limit").default_value(json!(10)),
            ];
            let schema = parameters_schema(&params);

            assert_eq!(schema["type"], "object");
            assert_eq!(schema["properties"]["city"]["type"], "string");
            assert_eq!(schema["properties"]["city"]["description"], "City name");
            assert_eq!(schema["properties"]["limit"]["default"], 10);
            assert_eq!(schema["required"], json!(["city"]));
        }

        #[test]
        fn empty_parameter_list() {
            let schema = parameters_schema(&[]);
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["required"], json!([]));
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn missing_required_fails() {
            let params = vec![Parameter::string("query").required()];
            let mut args = Arguments::new();
            let err = validate_arguments(&params, &mut args).expect_err("must fail");
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }

        #[test]
        fn default_is_injected() {
            let params = vec![Parameter::integer("limit").default_value(json!(5))];
            let mut args = Arguments::new();
            validate_arguments(&params, &mut args).expect("valid");
            assert_eq!(args.get::<i64>("limit"), Some(5));
        }

        #[test]
        fn kind_mismatch_fails() {
            let params = vec![Parameter::integer("limit")];
            let mut args = Arguments::new().with("limit", "ten");
            assert!(validate_arguments(&params, &mut args).is_err());
        }

        #[test]
        fn validator_rejects() {
            let params = vec![
                Parameter::integer("limit")
                    .validator(|v| {
                        if v.as_i64().is_some_and(|n| n > 0) {
                            Ok(())
                        } else {
                            Err("must be positive".into())
                        }
                    }),
            ];
            let mut args = Arguments::new().with("limit", -1);
            let err = validate_arguments(&params, &mut args).expect_err("must fail");
            assert!(matches!(err, ToolError::Validation { .. }));
        }
    }

    mod toolbox {
        use super::*;

        #[test]
        fn add_get_contains() {
            let mut tools = ToolBox::new();
            tools.add(echo_tool());
            assert!(tools.contains("echo"));
            assert!(tools.get("echo").is_some());
            assert!(!tools.contains("missing"));
            assert_eq!(tools.len(), 1);
        }

        #[test]
        fn descriptors_are_sorted_by_name() {
            let mut tools = ToolBox::new();
            tools.add(FunctionTool::new("zeta", "", vec![], |_, _| async {
                ToolOutput::ok(())
            }));
            tools.add(FunctionTool::new("alpha", "", vec![], |_, _| async {
                ToolOutput::ok(())
            }));

            let names: Vec<String> =
                tools.descriptors().into_iter().map(|d| d.name).collect();
            assert_eq!(names, vec!["alpha", "zeta"]);
        }
    }

    mod function_tool {
        use super::*;
        use crate::context::ExecutionContext;

        #[tokio::test]
        async fn executes_handler() {
            let ctx = ExecutionContext::new("test");
            let tool = echo_tool();
            let args = Arguments::new().with("message", "hi");
            let out = tool.execute(&ctx, args).await;
            assert_eq!(out.text().expect("text"), "hi");
        }

        #[test]
        fn descriptor_carries_schema() {
            let descriptor = echo_tool().descriptor();
            assert_eq!(descriptor.name, "echo");
            assert_eq!(descriptor.parameters["required"], json!(["message"]));
        }
    }
}
