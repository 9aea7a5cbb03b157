use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};

use crate::host::HostError;
use crate::migration::{ExecutionError, OwnerPathError, PlanError, StrategyError};

/// A structured error that can be serialized and surfaced to the operator.
///
/// The machine-readable `code` identifies the taxonomy entry, the context
/// map carries the addressing detail (asset path, owner path, field name)
/// needed to locate the problem, and `cause` preserves the chain down to
/// the collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be shown directly to the operator.
    pub message: String,
    /// Arbitrary key/value pairs that provide additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Default code used when an upstream error does not expose a specific code.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    /// Code used for errors created from free-form messages.
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";

    /// Construct a new error with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    /// Adds a contextual key/value pair to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the nested cause for the error.
    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

// `AppError` implements `std::error::Error` + `Send` + `Sync` + `'static`, so
// anyhow's blanket `impl<E> From<E> for anyhow::Error` already provides the
// `AppError -> anyhow::Error` conversion. A manual impl would conflict with it.

impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

impl From<HostError> for AppError {
    fn from(error: HostError) -> Self {
        let code = match &error {
            HostError::AssetNotFound(_) => "HOST/ASSET_NOT_FOUND",
            HostError::LoadFailed { .. } => "HOST/LOAD",
            HostError::PersistFailed { .. } => "HOST/PERSIST",
            HostError::FieldWrite { .. } => "HOST/FIELD_WRITE",
            HostError::Backend(_) => "HOST/BACKEND",
        };
        AppError::new(code, error.to_string())
    }
}

impl From<OwnerPathError> for AppError {
    fn from(error: OwnerPathError) -> Self {
        AppError::new("OWNER/RESOLUTION", error.to_string())
    }
}

impl From<StrategyError> for AppError {
    fn from(error: StrategyError) -> Self {
        let code = match &error {
            StrategyError::NotFound(_) => "STRATEGY/NOT_FOUND",
            StrategyError::FieldNotFound { .. } => "STRATEGY/FIELD_NOT_FOUND",
            StrategyError::Incompatible { .. } => "STRATEGY/INCOMPATIBLE",
            StrategyError::Host(_) => "STRATEGY/HOST",
        };
        match error {
            StrategyError::Host(host) => {
                AppError::new(code, "collaborator failure during conversion").with_cause(host)
            }
            other => AppError::new(code, other.to_string()),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(error: PlanError) -> Self {
        match error {
            PlanError::Prefab { path, source } => AppError::new("PLAN/PREFAB", source.to_string())
                .with_context("asset", path)
                .with_cause(source_app(source)),
            PlanError::SceneOpen { path, source } => {
                AppError::new("PLAN/SCENE_OPEN", source.to_string())
                    .with_context("scene", path)
                    .with_cause(source_app(source))
            }
            PlanError::SceneRestore { path, source } => {
                AppError::new("PLAN/SCENE_RESTORE", source.to_string())
                    .with_context("scene", path)
                    .with_cause(source_app(source))
            }
            PlanError::Record { path, source } => AppError::new("PLAN/RECORD", source.to_string())
                .with_context("asset", path)
                .with_cause(source_app(source)),
        }
    }
}

impl From<ExecutionError> for AppError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::UnresolvedPlan { issues } => AppError::new(
                "MIGRATE/UNRESOLVED_PLAN",
                "plan carries unresolved strategy issues",
            )
            .with_context("blocking_issues", issues.len().to_string()),
            ExecutionError::AssetOpen { asset, source } => {
                AppError::new("MIGRATE/ASSET_OPEN", source.to_string())
                    .with_context("asset", asset)
                    .with_cause(source_app(source))
            }
            ExecutionError::OwnerResolution {
                asset,
                owner,
                source,
            } => AppError::new("MIGRATE/OWNER_RESOLUTION", source.to_string())
                .with_context("asset", asset)
                .with_context("owner", owner.to_string())
                .with_cause(AppError::from(source)),
            ExecutionError::InstanceMissing {
                asset,
                owner,
                type_id,
            } => AppError::new(
                "MIGRATE/INSTANCE_MISSING",
                format!("no {type_id} instance at the planned owner"),
            )
            .with_context("asset", asset)
            .with_context("owner", owner.to_string())
            .with_context("type", type_id.to_string()),
            ExecutionError::Strategy {
                asset,
                owner,
                field,
                strategy,
                source,
            } => AppError::new("MIGRATE/STRATEGY", source.to_string())
                .with_context("asset", asset)
                .with_context("owner", owner.to_string())
                .with_context("field", field)
                .with_context("strategy", strategy)
                .with_cause(AppError::from(source)),
            ExecutionError::RecordStrategy {
                asset,
                field,
                strategy,
                source,
            } => AppError::new("MIGRATE/STRATEGY", source.to_string())
                .with_context("asset", asset)
                .with_context("field", field)
                .with_context("strategy", strategy)
                .with_cause(AppError::from(source)),
            ExecutionError::Commit {
                asset,
                owner,
                source,
            } => AppError::new("MIGRATE/COMMIT", source.to_string())
                .with_context("asset", asset)
                .with_context("owner", owner.to_string())
                .with_cause(source_app(source)),
            ExecutionError::Persistence { asset, source } => {
                AppError::new("MIGRATE/PERSISTENCE", source.to_string())
                    .with_context("asset", asset)
                    .with_cause(source_app(source))
            }
            ExecutionError::SaveAll { source } => {
                AppError::new("MIGRATE/SAVE_ALL", source.to_string()).with_cause(source_app(source))
            }
            ExecutionError::SceneOpen { path, source } => {
                AppError::new("MIGRATE/SCENE_OPEN", source.to_string())
                    .with_context("scene", path)
                    .with_cause(source_app(source))
            }
            ExecutionError::SceneRestore { path, source } => {
                AppError::new("MIGRATE/SCENE_RESTORE", source.to_string())
                    .with_context("scene", path)
                    .with_cause(source_app(source))
            }
        }
    }
}

fn source_app(error: HostError) -> AppError {
    AppError::from(error)
}
