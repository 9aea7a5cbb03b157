//! Conversion strategies and their registry.
//!
//! A strategy is a pure per-field mutation: read the original field's
//! current value through the instance's [`FieldAccess`], derive the target
//! value, write it. Strategies are looked up by id and built fresh for
//! every field they are applied to; nothing may be carried across
//! invocations.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::host::{FieldAccess, HostError};

use super::plan::UpgradableField;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no strategy registered under id {0:?}")]
    NotFound(String),
    #[error("field {field} not present on instance")]
    FieldNotFound { field: String },
    #[error("field {field} holds a value the strategy cannot convert: {reason}")]
    Incompatible { field: String, reason: String },
    #[error(transparent)]
    Host(#[from] HostError),
}

/// The single capability a conversion strategy implements.
pub trait MigrationStrategy: fmt::Debug + Send + Sync {
    /// Registry id this strategy answers to.
    fn id(&self) -> &'static str;

    /// Read the original field, write the derived target value. `field`
    /// carries both field names, the declared type arguments, and the
    /// provenance flags recorded at plan time.
    fn migrate(
        &self,
        io: &mut dyn FieldAccess,
        field: &UpgradableField,
    ) -> Result<(), StrategyError>;
}

type StrategyFactory = Box<dyn Fn() -> Box<dyn MigrationStrategy> + Send + Sync>;

/// Maps strategy ids to factories. `resolve` constructs a fresh instance
/// on every call.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: IndexMap<String, StrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry::default()
    }

    /// Registry preloaded with the built-in strategies.
    pub fn with_builtin_strategies() -> Self {
        let mut registry = StrategyRegistry::new();
        registry.register(CopyValueStrategy.id(), || Box::new(CopyValueStrategy));
        registry.register(WrapInListStrategy.id(), || Box::new(WrapInListStrategy));
        registry
    }

    /// Map an id to a factory. A later registration under the same id
    /// replaces the earlier one.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: impl Fn() -> Box<dyn MigrationStrategy> + Send + Sync + 'static,
    ) {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Construct a fresh strategy instance for `id`.
    pub fn resolve(&self, id: &str) -> Result<Box<dyn MigrationStrategy>, StrategyError> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| StrategyError::NotFound(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Writes the original field's value into the target field unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyValueStrategy;

impl MigrationStrategy for CopyValueStrategy {
    fn id(&self) -> &'static str {
        "copy-value"
    }

    fn migrate(
        &self,
        io: &mut dyn FieldAccess,
        field: &UpgradableField,
    ) -> Result<(), StrategyError> {
        let value = io
            .read(&field.original_field)
            .ok_or_else(|| StrategyError::FieldNotFound {
                field: field.original_field.clone(),
            })?;
        io.write(&field.target_field, value)?;
        Ok(())
    }
}

/// Wraps the original field's value in a one-element list. The first
/// declared type argument names the element type of the wrapped field.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapInListStrategy;

impl MigrationStrategy for WrapInListStrategy {
    fn id(&self) -> &'static str {
        "wrap-in-list"
    }

    fn migrate(
        &self,
        io: &mut dyn FieldAccess,
        field: &UpgradableField,
    ) -> Result<(), StrategyError> {
        let value = io
            .read(&field.original_field)
            .ok_or_else(|| StrategyError::FieldNotFound {
                field: field.original_field.clone(),
            })?;
        if let Some(element) = field.type_arguments.first() {
            debug!(
                target = "fieldwright",
                event = "wrap_in_list",
                field = %field.original_field,
                element = %element,
            );
        }
        io.write(&field.target_field, Value::Array(vec![value]))?;
        Ok(())
    }
}
