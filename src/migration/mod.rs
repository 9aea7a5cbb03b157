//! The migration core: metadata scanning, strategy resolution, ownership
//! addressing, plan building, and plan execution.

pub mod execute;
pub mod metadata;
pub mod owner_path;
pub mod plan;
pub mod report;
pub mod strategy;

pub use execute::{execute_plan, ExecutionContext, ExecutionError, ExecutionReport};
pub use metadata::{
    FieldMigrationSpec, MetadataRegistry, TypeDescriptor, TypeKind, TypeMetadata, TypeRegistration,
};
pub use owner_path::{
    owner_path, resolve_among_top_level, resolve_in_root, OwnerPath, OwnerPathError,
};
pub use plan::{
    build_plan, MigrationPlan, PlanContext, PlanError, PlanIssue, PlanIssueKind, PlanOptions,
    UpgradableComponent, UpgradableField, UpgradablePrefab, UpgradableRecord, UpgradableScene,
};
pub use report::{plan_rows, IconHint, PlanRow};
pub use strategy::{
    CopyValueStrategy, MigrationStrategy, StrategyError, StrategyRegistry, WrapInListStrategy,
};
