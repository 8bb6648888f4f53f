//! Tool registry seam. The evaluator only sees [`ToolRegistry::lookup`] and
//! [`Tool::execute`]; argument validation belongs to the tool side.

use std::{future::Future, pin::Pin, sync::Arc};

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::{Value, ValueType};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ToolArgs = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Failed(String),
}

pub trait Tool: Send + Sync {
    fn execute(&self, args: ToolArgs) -> BoxFuture<'_, Result<Value, ToolError>>;
}

pub trait ToolRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ValueType,
    pub required: bool,
}

/// Argument shape a schema-validated tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: ValueType) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: ValueType) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn validate(&self, args: &ToolArgs) -> Result<(), ToolError> {
        for name in args.keys() {
            if !self.parameters.iter().any(|param| &param.name == name) {
                return Err(ToolError::InvalidArguments(format!(
                    "unknown argument '{name}'"
                )));
            }
        }
        for param in &self.parameters {
            match args.get(&param.name) {
                None if param.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        param.name
                    )));
                }
                Some(value) if !param.kind.accepts(value) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "argument '{}' expected {}, found {}",
                        param.name,
                        param.kind,
                        value.type_name()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Adapts an async closure into a [`Tool`], optionally behind a schema check.
pub struct FnTool<F> {
    schema: Option<ToolSchema>,
    callback: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    pub fn new(callback: F) -> Self {
        Self {
            schema: None,
            callback,
        }
    }

    pub fn with_schema(schema: ToolSchema, callback: F) -> Self {
        Self {
            schema: Some(schema),
            callback,
        }
    }
}

impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    fn execute(&self, args: ToolArgs) -> BoxFuture<'_, Result<Value, ToolError>> {
        if let Some(schema) = &self.schema {
            if let Err(err) = schema.validate(&args) {
                return Box::pin(async move { Err(err) });
            }
        }
        Box::pin((self.callback)(args))
    }
}

/// In-memory name → tool table.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(name.into(), tool);
        self
    }

    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, callback: F) -> &mut Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnTool::new(callback)))
    }

    pub fn register_with_schema<F, Fut>(
        &mut self,
        name: impl Into<String>,
        schema: ToolSchema,
        callback: F,
    ) -> &mut Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnTool::with_schema(schema, callback)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for ToolSet {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}
