//! Planned field migrations for serialized game assets.
//!
//! The engine discovers migratable fields declared in a
//! [`MetadataRegistry`], builds a reviewable [`MigrationPlan`] over the
//! host's prefabs, scenes, and standalone records ("Refresh"), and applies
//! the plan through caller-supplied conversion strategies ("Migrate").
//! The hosting environment stays behind the collaborator traits in
//! [`host`]; this crate owns only the sequencing, addressing, and
//! bookkeeping in between.

pub mod error;
pub mod host;
pub mod logging;
pub mod migration;

pub use error::{AppError, AppResult};
pub use host::{
    AssetStore, ContainerGraph, EditableContainer, FieldAccess, FieldProvenance, HostError,
    NodeId, PrefabKind, SceneHost, SlotId,
};
pub use migration::{
    build_plan, execute_plan, owner_path, plan_rows, resolve_among_top_level, resolve_in_root,
    CopyValueStrategy, ExecutionContext, ExecutionError,
    ExecutionReport, FieldMigrationSpec, IconHint, MetadataRegistry, MigrationPlan,
    MigrationStrategy, OwnerPath, OwnerPathError, PlanContext, PlanError, PlanIssue,
    PlanIssueKind, PlanOptions, PlanRow, StrategyError, StrategyRegistry, TypeDescriptor,
    TypeKind, TypeMetadata, TypeRegistration, UpgradableComponent, UpgradableField,
    UpgradablePrefab, UpgradableRecord, UpgradableScene, WrapInListStrategy,
};
