//! Migration plan model and the plan builder ("Refresh").
//!
//! `build_plan` walks every prefab container, configured scene, and
//! standalone record the host knows about, matches them against the
//! metadata registry, and produces an ownership-path-indexed plan: assets
//! that own instances that own field migrations. The plan is built once,
//! reviewed, consumed by [`execute_plan`](super::execute::execute_plan),
//! and discarded; it is never persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::host::{
    AssetStore, ContainerGraph, FieldAccess, FieldProvenance, HostError, PrefabKind, SceneHost,
};

use super::metadata::{FieldMigrationSpec, MetadataRegistry, TypeDescriptor, TypeKind};
use super::owner_path::{owner_path, OwnerPath};
use super::strategy::{MigrationStrategy, StrategyRegistry};

/// Scan toggles. The defaults mirror the source tool: prefab scans skip
/// instances on deactivated entities, scene scans include them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOptions {
    pub prefab_inactive: bool,
    pub scene_inactive: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            prefab_inactive: false,
            scene_inactive: true,
        }
    }
}

/// One field migration bound to one live instance.
#[derive(Debug)]
pub struct UpgradableField {
    pub original_field: String,
    pub target_field: String,
    pub type_arguments: Vec<TypeDescriptor>,
    /// The value was explicitly set on this instance, overriding its
    /// template. Mutually exclusive with `is_default_from_prefab`.
    pub is_override: bool,
    /// The value is inherited from a template and not locally overridden.
    pub is_default_from_prefab: bool,
    pub strategy: Box<dyn MigrationStrategy>,
}

/// One tagged-type instance found inside a container. Read-only after
/// plan build.
#[derive(Debug)]
pub struct UpgradableComponent {
    pub owner: OwnerPath,
    pub type_id: TypeDescriptor,
    pub fields: Vec<UpgradableField>,
}

#[derive(Debug)]
pub struct UpgradablePrefab {
    pub path: String,
    pub is_variant: bool,
    pub components: Vec<UpgradableComponent>,
}

#[derive(Debug)]
pub struct UpgradableScene {
    pub path: String,
    pub components: Vec<UpgradableComponent>,
}

/// A standalone data asset whose single record carries migratable fields.
#[derive(Debug)]
pub struct UpgradableRecord {
    pub path: String,
    pub type_id: TypeDescriptor,
    pub fields: Vec<UpgradableField>,
}

/// Discovery problem recorded while building a plan. Issues are localized
/// per field: one bad declaration never suppresses the rest of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanIssue {
    pub asset_path: String,
    /// Absent for standalone records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerPath>,
    pub type_id: TypeDescriptor,
    pub field: String,
    pub kind: PlanIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlanIssueKind {
    /// The declared strategy id has no registration. Blocks Migrate until
    /// resolved; the operator must see this before anything is mutated.
    StrategyNotFound { strategy: String },
    /// The declared field is absent on the instance (schema drift). The
    /// field was skipped.
    FieldNotFound,
}

impl PlanIssue {
    pub fn is_blocking(&self) -> bool {
        matches!(self.kind, PlanIssueKind::StrategyNotFound { .. })
    }
}

/// The product of one Refresh.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    pub prefabs: Vec<UpgradablePrefab>,
    pub scenes: Vec<UpgradableScene>,
    pub records: Vec<UpgradableRecord>,
    pub issues: Vec<PlanIssue>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty() && self.scenes.is_empty() && self.records.is_empty()
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &PlanIssue> {
        self.issues.iter().filter(|issue| issue.is_blocking())
    }

    pub fn has_blocking_issues(&self) -> bool {
        self.blocking_issues().next().is_some()
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to inspect prefab {path}: {source}")]
    Prefab {
        path: String,
        #[source]
        source: HostError,
    },
    #[error("failed to open scene {path}: {source}")]
    SceneOpen {
        path: String,
        #[source]
        source: HostError,
    },
    #[error("failed to restore active scene {path}: {source}")]
    SceneRestore {
        path: String,
        #[source]
        source: HostError,
    },
    #[error("failed to load record {path}: {source}")]
    Record {
        path: String,
        #[source]
        source: HostError,
    },
}

/// Collaborators and configuration for one plan build.
pub struct PlanContext<'a, S: AssetStore, H: SceneHost> {
    pub assets: &'a mut S,
    pub scenes: &'a mut H,
    pub metadata: &'a MetadataRegistry,
    pub strategies: &'a StrategyRegistry,
    pub options: PlanOptions,
}

impl<'a, S: AssetStore, H: SceneHost> PlanContext<'a, S, H> {
    pub fn new(
        assets: &'a mut S,
        scenes: &'a mut H,
        metadata: &'a MetadataRegistry,
        strategies: &'a StrategyRegistry,
    ) -> Self {
        PlanContext {
            assets,
            scenes,
            metadata,
            strategies,
            options: PlanOptions::default(),
        }
    }
}

/// Build a migration plan over the host's full asset universe.
pub fn build_plan<S: AssetStore, H: SceneHost>(
    ctx: PlanContext<'_, S, H>,
) -> Result<MigrationPlan, PlanError> {
    let PlanContext {
        assets,
        scenes,
        metadata,
        strategies,
        options,
    } = ctx;

    let mut plan = MigrationPlan::default();

    scan_prefabs(assets, metadata, strategies, options, &mut plan)?;
    scan_scenes(scenes, metadata, strategies, options, &mut plan)?;
    scan_records(assets, metadata, strategies, &mut plan)?;

    info!(
        target = "fieldwright",
        event = "plan_built",
        prefabs = plan.prefabs.len(),
        scenes = plan.scenes.len(),
        records = plan.records.len(),
        issues = plan.issues.len(),
    );
    Ok(plan)
}

fn scan_prefabs<S: AssetStore>(
    assets: &mut S,
    metadata: &MetadataRegistry,
    strategies: &StrategyRegistry,
    options: PlanOptions,
    plan: &mut MigrationPlan,
) -> Result<(), PlanError> {
    for path in assets.find_prefab_paths() {
        let kind = assets.prefab_kind(&path).map_err(|source| PlanError::Prefab {
            path: path.clone(),
            source,
        })?;
        if !kind.is_migratable() {
            continue;
        }

        let view = assets.load_prefab(&path).map_err(|source| PlanError::Prefab {
            path: path.clone(),
            source,
        })?;

        let mut components = Vec::new();
        for (descriptor, meta) in metadata.scan() {
            if meta.kind != TypeKind::Component {
                continue;
            }
            collect_components(
                &view,
                &path,
                descriptor,
                &meta.fields,
                strategies,
                options.prefab_inactive,
                &mut components,
                &mut plan.issues,
            );
        }

        if components.is_empty() {
            continue;
        }
        info!(
            target = "fieldwright",
            event = "plan_prefab",
            path = %path,
            components = components.len(),
        );
        plan.prefabs.push(UpgradablePrefab {
            path,
            is_variant: kind == PrefabKind::Variant,
            components,
        });
    }
    Ok(())
}

fn scan_scenes<H: SceneHost>(
    scenes: &mut H,
    metadata: &MetadataRegistry,
    strategies: &StrategyRegistry,
    options: PlanOptions,
    plan: &mut MigrationPlan,
) -> Result<(), PlanError> {
    let scene_paths = scenes.configured_scene_paths();
    if scene_paths.is_empty() {
        return Ok(());
    }

    let original = scenes.active_scene_path();
    let outcome = sweep_scenes(scenes, &scene_paths, metadata, strategies, options, plan);

    // Restore the previously active scene on every exit path.
    let restore = scenes.open_scene(&original).map(|_| ());
    match (outcome, restore) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(source)) => Err(PlanError::SceneRestore {
            path: original,
            source,
        }),
        (Err(err), restore) => {
            if let Err(source) = restore {
                warn!(
                    target = "fieldwright",
                    event = "scene_restore_failed",
                    path = %original,
                    error = %source,
                );
            }
            Err(err)
        }
    }
}

fn sweep_scenes<H: SceneHost>(
    scenes: &mut H,
    scene_paths: &[String],
    metadata: &MetadataRegistry,
    strategies: &StrategyRegistry,
    options: PlanOptions,
    plan: &mut MigrationPlan,
) -> Result<(), PlanError> {
    for path in scene_paths {
        let scene = scenes.open_scene(path).map_err(|source| PlanError::SceneOpen {
            path: path.clone(),
            source,
        })?;

        let mut components = Vec::new();
        for (descriptor, meta) in metadata.scan() {
            if meta.kind != TypeKind::Component {
                continue;
            }
            collect_components(
                &scene,
                path,
                descriptor,
                &meta.fields,
                strategies,
                options.scene_inactive,
                &mut components,
                &mut plan.issues,
            );
        }

        if components.is_empty() {
            continue;
        }
        info!(
            target = "fieldwright",
            event = "plan_scene",
            path = %path,
            components = components.len(),
        );
        plan.scenes.push(UpgradableScene {
            path: path.clone(),
            components,
        });
    }
    Ok(())
}

fn scan_records<S: AssetStore>(
    assets: &mut S,
    metadata: &MetadataRegistry,
    strategies: &StrategyRegistry,
    plan: &mut MigrationPlan,
) -> Result<(), PlanError> {
    for (descriptor, meta) in metadata.scan() {
        if meta.kind != TypeKind::Record {
            continue;
        }
        for path in assets.find_records_of_type(descriptor.name()) {
            let record = assets.load_record(&path).map_err(|source| PlanError::Record {
                path: path.clone(),
                source,
            })?;

            let fields = extract_fields(
                &path,
                None,
                descriptor,
                &meta.fields,
                strategies,
                |field| record.provenance(field),
                &mut plan.issues,
            );
            if fields.is_empty() {
                continue;
            }
            info!(
                target = "fieldwright",
                event = "plan_record",
                path = %path,
                type_id = %descriptor,
                fields = fields.len(),
            );
            plan.records.push(UpgradableRecord {
                path,
                type_id: descriptor.clone(),
                fields,
            });
        }
    }
    Ok(())
}

/// Scan one container for instances of one type and append the resulting
/// component nodes. Shared between the prefab and scene walks.
#[allow(clippy::too_many_arguments)]
fn collect_components<G: ContainerGraph>(
    graph: &G,
    asset_path: &str,
    descriptor: &TypeDescriptor,
    specs: &[FieldMigrationSpec],
    strategies: &StrategyRegistry,
    include_inactive: bool,
    out: &mut Vec<UpgradableComponent>,
    issues: &mut Vec<PlanIssue>,
) {
    for slot in graph.instances_of_type(descriptor.name(), include_inactive) {
        let owner = owner_path(graph, graph.node_of(slot));
        let fields = extract_fields(
            asset_path,
            Some(&owner),
            descriptor,
            specs,
            strategies,
            |field| graph.field_provenance(slot, field),
            issues,
        );
        if fields.is_empty() {
            continue;
        }
        out.push(UpgradableComponent {
            owner,
            type_id: descriptor.clone(),
            fields,
        });
    }
}

/// Per-instance field extraction. Missing fields and unknown strategies
/// are recorded as issues and skipped; everything else becomes an
/// [`UpgradableField`] in spec order.
fn extract_fields(
    asset_path: &str,
    owner: Option<&OwnerPath>,
    descriptor: &TypeDescriptor,
    specs: &[FieldMigrationSpec],
    strategies: &StrategyRegistry,
    provenance_of: impl Fn(&str) -> Option<FieldProvenance>,
    issues: &mut Vec<PlanIssue>,
) -> Vec<UpgradableField> {
    let mut fields = Vec::new();
    for spec in specs {
        let Some(provenance) = provenance_of(&spec.original_field) else {
            warn!(
                target = "fieldwright",
                event = "plan_field_missing",
                asset = %asset_path,
                type_id = %descriptor,
                field = %spec.original_field,
            );
            issues.push(PlanIssue {
                asset_path: asset_path.to_string(),
                owner: owner.cloned(),
                type_id: descriptor.clone(),
                field: spec.original_field.clone(),
                kind: PlanIssueKind::FieldNotFound,
            });
            continue;
        };

        let strategy = match strategies.resolve(&spec.strategy) {
            Ok(strategy) => strategy,
            Err(_) => {
                warn!(
                    target = "fieldwright",
                    event = "plan_strategy_missing",
                    asset = %asset_path,
                    type_id = %descriptor,
                    field = %spec.original_field,
                    strategy = %spec.strategy,
                );
                issues.push(PlanIssue {
                    asset_path: asset_path.to_string(),
                    owner: owner.cloned(),
                    type_id: descriptor.clone(),
                    field: spec.original_field.clone(),
                    kind: PlanIssueKind::StrategyNotFound {
                        strategy: spec.strategy.clone(),
                    },
                });
                continue;
            }
        };

        fields.push(UpgradableField {
            original_field: spec.original_field.clone(),
            target_field: spec.target_field.clone(),
            type_arguments: spec.type_arguments.clone(),
            is_override: provenance.prefab_override,
            is_default_from_prefab: provenance.instantiated_from_template
                && !provenance.prefab_override,
            strategy,
        });
    }
    fields
}
