use crate::protocol::models::{JsonSchema as RawSchema, Tool};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<Result<Value>> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub parameters: RawSchema,
}

/// A function call requested by the remote agent. `arguments` is the raw
/// JSON text exactly as received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// Caller-supplied tools, keyed by unique name.
///
/// Cloning is cheap: handlers are shared.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    defs: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.defs.iter().map(|d| d.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for ToolRegistry {
    /// Registries compare by their advertised definitions.
    fn eq(&self, other: &Self) -> bool {
        self.defs == other.defs
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.defs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<ToolHandler> {
        self.handlers.get(name).cloned()
    }

    /// Register a typed tool; the parameter schema is derived from `TArgs`.
    ///
    /// # Errors
    /// Returns an error if a tool with the same name is already registered.
    #[allow(clippy::result_large_err)]
    pub fn tool<TArgs, TResp, F, Fut>(&mut self, name: &str, handler: F) -> Result<()>
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register_typed(name, None, handler)
    }

    /// Register a typed tool with a description shown to the model.
    ///
    /// # Errors
    /// Returns an error if a tool with the same name is already registered.
    #[allow(clippy::result_large_err)]
    pub fn tool_with_description<TArgs, TResp, F, Fut>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register_typed(name, Some(description.into()), handler)
    }

    /// Register a tool with an explicit JSON schema and an untyped handler.
    ///
    /// # Errors
    /// Returns an error if a tool with the same name is already registered.
    #[allow(clippy::result_large_err)]
    pub fn raw_tool<F, Fut>(
        &mut self,
        name: &str,
        description: Option<String>,
        parameters: RawSchema,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |value: Value| -> BoxFuture<Result<Value>> {
            Box::pin(handler(value))
        });
        self.insert(ToolDefinition { name: name.to_string(), description, parameters }, handler)
    }

    #[allow(clippy::result_large_err)]
    fn register_typed<TArgs, TResp, F, Fut>(
        &mut self,
        name: &str,
        description: Option<String>,
        handler: F,
    ) -> Result<()>
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        let schema = schemars::schema_for!(TArgs);
        let parameters = serde_json::to_value(&schema)?;

        let user_handler = Arc::new(handler);
        let handler: ToolHandler = Arc::new(move |value: Value| -> BoxFuture<Result<Value>> {
            let user_handler = Arc::clone(&user_handler);
            Box::pin(async move {
                let args: TArgs =
                    serde_json::from_value(value).map_err(|e| Error::Tool(e.to_string()))?;
                let resp = user_handler(args).await?;
                serde_json::to_value(resp).map_err(|e| Error::Tool(e.to_string()))
            })
        });

        self.insert(ToolDefinition { name: name.to_string(), description, parameters }, handler)
    }

    #[allow(clippy::result_large_err)]
    fn insert(&mut self, def: ToolDefinition, handler: ToolHandler) -> Result<()> {
        if self.handlers.contains_key(&def.name) {
            return Err(Error::DuplicateTool(def.name));
        }
        self.handlers.insert(def.name.clone(), handler);
        self.defs.push(def);
        Ok(())
    }

    /// Convert all registered tools into protocol-level tool definitions.
    #[must_use]
    pub fn as_tools(&self) -> Vec<Tool> {
        self.defs
            .iter()
            .map(|def| Tool::Function {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            })
            .collect()
    }
}
