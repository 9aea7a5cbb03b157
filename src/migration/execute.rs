//! Plan execution ("Migrate").
//!
//! Applies a previously built [`MigrationPlan`] against external storage,
//! in strict order: prefab containers, then standalone records, then a
//! store-wide flush, then scenes. There is no transaction and no rollback;
//! a failure aborts the run with full addressing context, leaving earlier
//! assets persisted and the failing asset possibly half-migrated. The
//! operation is supervised and re-runnable over version-controlled assets,
//! so the recovery path is: fix the cause, Refresh, Migrate again.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::host::{
    AssetStore, EditableContainer, FieldAccess, FieldProvenance, HostError, NodeId, SceneHost,
    SlotId,
};

use super::metadata::TypeDescriptor;
use super::owner_path::{resolve_among_top_level, resolve_in_root, OwnerPath, OwnerPathError};
use super::plan::{MigrationPlan, PlanIssue, UpgradableComponent};
use super::strategy::StrategyError;

/// Collaborators for one plan execution.
pub struct ExecutionContext<'a, S: AssetStore, H: SceneHost> {
    pub assets: &'a mut S,
    pub scenes: &'a mut H,
}

impl<'a, S: AssetStore, H: SceneHost> ExecutionContext<'a, S, H> {
    pub fn new(assets: &'a mut S, scenes: &'a mut H) -> Self {
        ExecutionContext { assets, scenes }
    }
}

/// Counters for one completed execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub prefabs: u64,
    pub scenes: u64,
    pub records: u64,
    pub components: u64,
    pub fields: u64,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("plan carries unresolved strategy issues; register the missing strategies and refresh")]
    UnresolvedPlan { issues: Vec<PlanIssue> },
    #[error("failed to open {asset} for migration: {source}")]
    AssetOpen {
        asset: String,
        #[source]
        source: HostError,
    },
    #[error("cannot locate owner {owner} in {asset}: {source}")]
    OwnerResolution {
        asset: String,
        owner: OwnerPath,
        #[source]
        source: OwnerPathError,
    },
    #[error("no {type_id} instance on {owner} in {asset}")]
    InstanceMissing {
        asset: String,
        owner: OwnerPath,
        type_id: TypeDescriptor,
    },
    #[error("strategy {strategy} failed for field {field} of {owner} in {asset}: {source}")]
    Strategy {
        asset: String,
        owner: OwnerPath,
        field: String,
        strategy: String,
        #[source]
        source: StrategyError,
    },
    #[error("strategy {strategy} failed for field {field} of record {asset}: {source}")]
    RecordStrategy {
        asset: String,
        field: String,
        strategy: String,
        #[source]
        source: StrategyError,
    },
    #[error("failed to commit changes on {owner} in {asset}: {source}")]
    Commit {
        asset: String,
        owner: OwnerPath,
        #[source]
        source: HostError,
    },
    #[error("failed to persist {asset}: {source}")]
    Persistence {
        asset: String,
        #[source]
        source: HostError,
    },
    #[error("failed to flush the asset store: {source}")]
    SaveAll {
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
}

/// Apply a plan. Mutates external storage through the collaborators.
pub fn execute_plan<S: AssetStore, H: SceneHost>(
    plan: &MigrationPlan,
    ctx: ExecutionContext<'_, S, H>,
) -> Result<ExecutionReport, ExecutionError> {
    let ExecutionContext { assets, scenes } = ctx;

    // Unknown strategies were surfaced at plan time; refuse to touch any
    // asset while they stand.
    if plan.has_blocking_issues() {
        return Err(ExecutionError::UnresolvedPlan {
            issues: plan.blocking_issues().cloned().collect(),
        });
    }

    let mut report = ExecutionReport::default();

    apply_prefabs(assets, plan, &mut report)?;
    apply_records(assets, plan, &mut report)?;

    assets
        .save_all()
        .map_err(|source| ExecutionError::SaveAll { source })?;

    if !plan.scenes.is_empty() {
        let original = scenes.active_scene_path();
        let outcome = apply_scenes(scenes, plan, &mut report);

        // Restore the previously active scene on every exit path.
        let restore = scenes.open_scene(&original).map(|_| ());
        match (outcome, restore) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(source)) => {
                return Err(ExecutionError::SceneRestore {
                    path: original,
                    source,
                })
            }
            (Err(err), restore) => {
                if let Err(source) = restore {
                    warn!(
                        target = "fieldwright",
                        event = "scene_restore_failed",
                        path = %original,
                        error = %source,
                    );
                }
                return Err(err);
            }
        }
    }

    info!(
        target = "fieldwright",
        event = "migration_complete",
        prefabs = report.prefabs,
        scenes = report.scenes,
        records = report.records,
        fields = report.fields,
    );
    Ok(report)
}

fn apply_prefabs<S: AssetStore>(
    assets: &mut S,
    plan: &MigrationPlan,
    report: &mut ExecutionReport,
) -> Result<(), ExecutionError> {
    for prefab in &plan.prefabs {
        let mut contents =
            assets
                .open_prefab_contents(&prefab.path)
                .map_err(|source| ExecutionError::AssetOpen {
                    asset: prefab.path.clone(),
                    source,
                })?;

        for component in &prefab.components {
            let root = prefab_root(&contents, &prefab.path, component)?;
            let node = resolve_in_root(&contents, root, &component.owner).map_err(|source| {
                ExecutionError::OwnerResolution {
                    asset: prefab.path.clone(),
                    owner: component.owner.clone(),
                    source,
                }
            })?;
            let slot = apply_component_fields(&mut contents, &prefab.path, component, node, report)?;

            // The instance's stored form now diverges from its template.
            contents
                .record_template_divergence(slot)
                .map_err(|source| ExecutionError::Commit {
                    asset: prefab.path.clone(),
                    owner: component.owner.clone(),
                    source,
                })?;
        }

        assets
            .persist_prefab(&prefab.path, &contents)
            .map_err(|source| ExecutionError::Persistence {
                asset: prefab.path.clone(),
                source,
            })?;
        assets.release_prefab(contents);
        report.prefabs += 1;
        info!(
            target = "fieldwright",
            event = "prefab_migrated",
            path = %prefab.path,
            components = prefab.components.len(),
        );
    }
    Ok(())
}

fn apply_records<S: AssetStore>(
    assets: &mut S,
    plan: &MigrationPlan,
    report: &mut ExecutionReport,
) -> Result<(), ExecutionError> {
    for record in &plan.records {
        let mut handle =
            assets
                .load_record(&record.path)
                .map_err(|source| ExecutionError::AssetOpen {
                    asset: record.path.clone(),
                    source,
                })?;

        for field in &record.fields {
            field
                .strategy
                .migrate(&mut handle, field)
                .map_err(|source| ExecutionError::RecordStrategy {
                    asset: record.path.clone(),
                    field: field.original_field.clone(),
                    strategy: field.strategy.id().to_string(),
                    source,
                })?;
            report.fields += 1;
        }

        assets
            .mark_record_dirty(&record.path)
            .map_err(|source| ExecutionError::Persistence {
                asset: record.path.clone(),
                source,
            })?;
        report.records += 1;
        info!(
            target = "fieldwright",
            event = "record_migrated",
            path = %record.path,
            fields = record.fields.len(),
        );
    }
    Ok(())
}

fn apply_scenes<H: SceneHost>(
    scenes: &mut H,
    plan: &MigrationPlan,
    report: &mut ExecutionReport,
) -> Result<(), ExecutionError> {
    for planned in &plan.scenes {
        let mut scene =
            scenes
                .open_scene(&planned.path)
                .map_err(|source| ExecutionError::SceneOpen {
                    path: planned.path.clone(),
                    source,
                })?;

        for component in &planned.components {
            let node = resolve_among_top_level(&scene, &component.owner).map_err(|source| {
                ExecutionError::OwnerResolution {
                    asset: planned.path.clone(),
                    owner: component.owner.clone(),
                    source,
                }
            })?;
            apply_component_fields(&mut scene, &planned.path, component, node, report)?;
        }

        scenes
            .mark_scene_modified(&planned.path)
            .map_err(|source| ExecutionError::Persistence {
                asset: planned.path.clone(),
                source,
            })?;
        scenes
            .save_scene(&planned.path, &scene)
            .map_err(|source| ExecutionError::Persistence {
                asset: planned.path.clone(),
                source,
            })?;
        report.scenes += 1;
        info!(
            target = "fieldwright",
            event = "scene_migrated",
            path = %planned.path,
            components = planned.components.len(),
        );
    }
    Ok(())
}

/// A prefab container's single root entity.
fn prefab_root<C: EditableContainer>(
    contents: &C,
    asset: &str,
    component: &UpgradableComponent,
) -> Result<NodeId, ExecutionError> {
    contents
        .top_level()
        .into_iter()
        .next()
        .ok_or_else(|| ExecutionError::OwnerResolution {
            asset: asset.to_string(),
            owner: component.owner.clone(),
            source: OwnerPathError::RootNotFound {
                path: component.owner.as_str().to_string(),
                name: component.owner.as_str().to_string(),
            },
        })
}

/// Locate the planned instance on `node` and run every field's strategy,
/// then commit the instance without recording undo history. Returns the
/// slot so the prefab pass can record template divergence on it.
fn apply_component_fields<C: EditableContainer>(
    contents: &mut C,
    asset: &str,
    component: &UpgradableComponent,
    node: NodeId,
    report: &mut ExecutionReport,
) -> Result<SlotId, ExecutionError> {
    let slot = contents
        .slot_on_node(node, component.type_id.name())
        .ok_or_else(|| ExecutionError::InstanceMissing {
            asset: asset.to_string(),
            owner: component.owner.clone(),
            type_id: component.type_id.clone(),
        })?;

    {
        let mut io = SlotFields {
            contents: &mut *contents,
            slot,
        };
        for field in &component.fields {
            field
                .strategy
                .migrate(&mut io, field)
                .map_err(|source| ExecutionError::Strategy {
                    asset: asset.to_string(),
                    owner: component.owner.clone(),
                    field: field.original_field.clone(),
                    strategy: field.strategy.id().to_string(),
                    source,
                })?;
            report.fields += 1;
        }
    }

    contents
        .commit_slot(slot)
        .map_err(|source| ExecutionError::Commit {
            asset: asset.to_string(),
            owner: component.owner.clone(),
            source,
        })?;
    report.components += 1;
    Ok(slot)
}

/// Field access scoped to one component slot of a loaded container; what
/// strategies see during container migration.
struct SlotFields<'a, C: EditableContainer> {
    contents: &'a mut C,
    slot: SlotId,
}

impl<C: EditableContainer> FieldAccess for SlotFields<'_, C> {
    fn provenance(&self, field: &str) -> Option<FieldProvenance> {
        self.contents.field_provenance(self.slot, field)
    }

    fn read(&self, field: &str) -> Option<serde_json::Value> {
        self.contents.read_field(self.slot, field)
    }

    fn write(&mut self, field: &str, value: serde_json::Value) -> Result<(), HostError> {
        self.contents.write_field(self.slot, field, value)
    }
}
