//! Registry of callable tools

use async_trait::async_trait;
use beacon_mcp_protocol::Tool;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

/// Executes one tool invocation
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, arguments: Map<String, Value>) -> anyhow::Result<Value>;
}

/// Adapter that lets a plain async closure act as a tool handler
struct FnToolHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn execute(&self, arguments: Map<String, Value>) -> anyhow::Result<Value> {
        (self.0)(arguments).await
    }
}

/// A registered tool: metadata plus the handler that executes it
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    /// Build a descriptor around an async closure
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(
            name,
            description,
            input_schema,
            Arc::new(FnToolHandler(handler)),
        )
    }

    /// The protocol view of this tool, as listed by `tools/list`
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if self.description.trim().is_empty() {
            return Err(RegistryError::InvalidDescription(self.name.clone()));
        }
        if !self.input_schema.is_object() {
            return Err(RegistryError::InvalidSchema(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Error type for tool registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool name must be a non-empty string")]
    InvalidName,

    #[error("Tool '{0}' must have a non-empty description")]
    InvalidDescription(String),

    #[error("Tool '{0}' must have an object input schema")]
    InvalidSchema(String),

    #[error("Tool '{0}' is already registered")]
    Duplicate(String),
}

/// Thread-safe registry of tools, keyed and listed by name
///
/// Read-mostly: lookups take a shared lock and clone an `Arc` to the
/// descriptor, so no lock is held while a tool executes.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<ToolDescriptor>>> {
        self.tools.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<ToolDescriptor>>> {
        self.tools
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or description, a non-object input schema, or a
    /// name that is already taken. A failed registration leaves the registry
    /// unchanged.
    pub fn register(&self, tool: ToolDescriptor) -> Result<(), RegistryError> {
        tool.validate()?;

        let mut tools = self.write();
        if tools.contains_key(&tool.name) {
            return Err(RegistryError::Duplicate(tool.name));
        }
        debug!(tool = %tool.name, "Registered tool");
        tools.insert(tool.name.clone(), Arc::new(tool));
        Ok(())
    }

    /// Register several tools in order, stopping at the first failure.
    ///
    /// Tools registered before the failure stay registered.
    pub fn register_all(
        &self,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<(), RegistryError> {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.read().get(name).cloned()
    }

    /// All registered tools, ordered by name
    pub fn list(&self) -> Vec<Tool> {
        self.read().values().map(|tool| tool.to_tool()).collect()
    }

    /// Remove a tool, returning whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            debug!(tool = %name, "Unregistered tool");
        }
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
