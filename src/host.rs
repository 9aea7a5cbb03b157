//! Collaborator seams between the migration engine and its hosting
//! environment.
//!
//! The engine never touches an asset database, serialization framework, or
//! scene graph directly. A host (an editor integration, a batch runner, a
//! test fixture) implements the traits in this module and hands them to
//! [`build_plan`](crate::migration::build_plan) and
//! [`execute_plan`](crate::migration::execute_plan).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifies an entity node within one loaded container hierarchy.
///
/// Only meaningful for the container it was obtained from, and only for the
/// lifetime of that load. Reloading an asset invalidates every previously
/// obtained id.
pub type NodeId = u64;

/// Identifies one typed instance (a component slot or a record body) within
/// one loaded container. Same validity rules as [`NodeId`].
pub type SlotId = u64;

/// Classification of a prefab asset as reported by the asset store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefabKind {
    Regular,
    Variant,
    /// Imported model archetype. Not migratable.
    Model,
    /// The path no longer resolves to a prefab.
    Missing,
}

impl PrefabKind {
    /// Only regular and variant prefabs participate in migration.
    pub const fn is_migratable(self) -> bool {
        matches!(self, PrefabKind::Regular | PrefabKind::Variant)
    }
}

/// Where an instance's field value comes from, as recorded by the host's
/// serialization layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProvenance {
    /// The value was explicitly set on this instance, overriding its
    /// template.
    pub prefab_override: bool,
    /// The instance was stamped from a template at all (regardless of
    /// whether the field diverged from it).
    pub instantiated_from_template: bool,
}

/// Failure reported by a collaborator. The engine wraps these with
/// addressing context before surfacing them.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("asset not found: {0}")]
    AssetNotFound(String),
    #[error("failed to load {path}: {reason}")]
    LoadFailed { path: String, reason: String },
    #[error("failed to persist {path}: {reason}")]
    PersistFailed { path: String, reason: String },
    #[error("field {field} rejected write: {reason}")]
    FieldWrite { field: String, reason: String },
    #[error("{0}")]
    Backend(String),
}

/// Read access to one loaded hierarchical container (a prefab's object
/// graph or a loaded scene).
///
/// Node and slot ids are assigned by the host per load. Enumeration order
/// contracts: `top_level` returns entities in the container's sibling
/// order, and `instances_of_type` returns slots in a stable depth-first
/// order over that hierarchy. Plan determinism leans on both.
pub trait ContainerGraph {
    /// Entities with no parent, in sibling order. A prefab container has
    /// exactly one; a scene may have any number.
    fn top_level(&self) -> Vec<NodeId>;

    /// Display name of a node.
    fn node_name(&self, node: NodeId) -> String;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Position of the node among its parent's children (or among the
    /// top-level entities for a parentless node).
    fn sibling_index(&self, node: NodeId) -> usize;

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId>;

    /// All instances of the named type anywhere in the container,
    /// including nested ones. `include_inactive` controls whether
    /// instances on deactivated entities are reported.
    fn instances_of_type(&self, type_id: &str, include_inactive: bool) -> Vec<SlotId>;

    /// The instance of the named type sitting directly on `node`, if any.
    fn slot_on_node(&self, node: NodeId, type_id: &str) -> Option<SlotId>;

    /// The entity a slot is attached to.
    fn node_of(&self, slot: SlotId) -> NodeId;

    /// Provenance of a named field on an instance. `None` when the
    /// serialized form has no such field (schema drift).
    fn field_provenance(&self, slot: SlotId, field: &str) -> Option<FieldProvenance>;

    /// Current raw value of a named field. `None` when absent.
    fn read_field(&self, slot: SlotId, field: &str) -> Option<Value>;
}

/// Mutation on top of [`ContainerGraph`], available on editable loads.
pub trait EditableContainer: ContainerGraph {
    fn write_field(&mut self, slot: SlotId, field: &str, value: Value) -> Result<(), HostError>;

    /// Flush pending field writes on an instance into its serialized form
    /// without recording an undo step.
    fn commit_slot(&mut self, slot: SlotId) -> Result<(), HostError>;

    /// Record that the instance's stored form now diverges from its
    /// template (override bookkeeping after a migration write).
    fn record_template_divergence(&mut self, slot: SlotId) -> Result<(), HostError>;
}

/// Flat field access on a single instance. This is the surface conversion
/// strategies program against; it is also how standalone record assets
/// expose their body.
pub trait FieldAccess {
    fn provenance(&self, field: &str) -> Option<FieldProvenance>;

    fn read(&self, field: &str) -> Option<Value>;

    fn write(&mut self, field: &str, value: Value) -> Result<(), HostError>;
}

/// The asset database seam: prefab and standalone-record enumeration,
/// loading, and persistence.
///
/// Associated types let a host keep its concrete container representation;
/// the engine never needs to downcast. Writes made through a
/// [`Self::Record`] handle must be visible to the store once the record is
/// marked dirty and `save_all` runs.
pub trait AssetStore {
    type Contents: EditableContainer;
    type Record: FieldAccess;

    /// Paths of every prefab asset known to the store.
    fn find_prefab_paths(&self) -> Vec<String>;

    fn prefab_kind(&self, path: &str) -> Result<PrefabKind, HostError>;

    /// Read-only load for scanning. The returned view is discarded without
    /// persistence.
    fn load_prefab(&self, path: &str) -> Result<Self::Contents, HostError>;

    /// Editable copy for migration. Pair with `persist_prefab` and
    /// `release_prefab`.
    fn open_prefab_contents(&mut self, path: &str) -> Result<Self::Contents, HostError>;

    fn persist_prefab(&mut self, path: &str, contents: &Self::Contents) -> Result<(), HostError>;

    fn release_prefab(&mut self, contents: Self::Contents);

    /// Paths of every standalone record asset of exactly the named type.
    fn find_records_of_type(&self, type_id: &str) -> Vec<String>;

    fn load_record(&mut self, path: &str) -> Result<Self::Record, HostError>;

    /// Mark a record as carrying unsaved changes; flushed by `save_all`.
    fn mark_record_dirty(&mut self, path: &str) -> Result<(), HostError>;

    /// Flush all pending asset edits to storage.
    fn save_all(&mut self) -> Result<(), HostError>;
}

/// The scene manager seam.
///
/// Opening a scene switches the host's single "active scene" slot; callers
/// that sweep multiple scenes must restore the previously active one before
/// returning. The engine brackets its own sweeps accordingly.
pub trait SceneHost {
    type Scene: EditableContainer;

    /// Scene paths configured for the project, in configuration order.
    fn configured_scene_paths(&self) -> Vec<String>;

    fn active_scene_path(&self) -> String;

    fn open_scene(&mut self, path: &str) -> Result<Self::Scene, HostError>;

    fn mark_scene_modified(&mut self, path: &str) -> Result<(), HostError>;

    fn save_scene(&mut self, path: &str, scene: &Self::Scene) -> Result<(), HostError>;
}
