#![allow(dead_code)]

//! In-memory host fake shared by the integration suites.
//!
//! `MemoryAssets` and `MemoryScenes` implement the collaborator traits
//! over plain trees of [`TreeNode`]s. Both push every storage-touching
//! call into a shared journal so tests can assert the executor's
//! sequencing, and containers opened for editing write their state back
//! into the fake store on persist/save.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use fieldwright::{
    AssetStore, ContainerGraph, EditableContainer, FieldAccess, FieldProvenance, HostError,
    NodeId, PrefabKind, SceneHost, SlotId,
};

pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn new_journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn journal_entries(journal: &Journal) -> Vec<String> {
    journal.borrow().clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub value: Value,
    pub provenance: FieldProvenance,
}

impl FieldState {
    pub fn plain(value: Value) -> Self {
        FieldState {
            value,
            provenance: FieldProvenance::default(),
        }
    }

    /// Locally overridden on a template instance.
    pub fn overridden(value: Value) -> Self {
        FieldState {
            value,
            provenance: FieldProvenance {
                prefab_override: true,
                instantiated_from_template: true,
            },
        }
    }

    /// Inherited from a template, not locally changed.
    pub fn template_default(value: Value) -> Self {
        FieldState {
            value,
            provenance: FieldProvenance {
                prefab_override: false,
                instantiated_from_template: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeComponent {
    pub type_id: String,
    pub fields: Vec<(String, FieldState)>,
}

impl TreeComponent {
    pub fn new(type_id: &str) -> Self {
        TreeComponent {
            type_id: type_id.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, state: FieldState) -> Self {
        self.fields.push((name.to_string(), state));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub active: bool,
    pub components: Vec<TreeComponent>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(name: &str) -> Self {
        TreeNode {
            name: name.to_string(),
            active: true,
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn component(mut self, component: TreeComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn child(mut self, node: TreeNode) -> Self {
        self.children.push(node);
        self
    }
}

/// Look up a field anywhere in a forest by node name, component type, and
/// field name. For assertions against persisted store state.
pub fn field_value(roots: &[TreeNode], node: &str, type_id: &str, field: &str) -> Option<Value> {
    fn walk(current: &TreeNode, node: &str, type_id: &str, field: &str) -> Option<Value> {
        if current.name == node {
            for component in &current.components {
                if component.type_id == type_id {
                    for (name, state) in &component.fields {
                        if name == field {
                            return Some(state.value.clone());
                        }
                    }
                }
            }
        }
        current
            .children
            .iter()
            .find_map(|child| walk(child, node, type_id, field))
    }
    roots
        .iter()
        .find_map(|root| walk(root, node, type_id, field))
}

#[derive(Debug, Clone)]
struct ArenaNode {
    name: String,
    active: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    slots: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ArenaSlot {
    node: usize,
    type_id: String,
    fields: Vec<(String, FieldState)>,
}

/// One loaded container: a prefab's object graph or a scene's entity
/// forest, flattened into an arena. Node and slot ids are depth-first
/// discovery order, which keeps plan ordering deterministic.
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    nodes: Vec<ArenaNode>,
    slots: Vec<ArenaSlot>,
    top: Vec<usize>,
    journal: Option<Journal>,
    tag: String,
}

impl MemoryContainer {
    pub fn from_roots(roots: &[TreeNode]) -> Self {
        let mut container = MemoryContainer {
            nodes: Vec::new(),
            slots: Vec::new(),
            top: Vec::new(),
            journal: None,
            tag: String::new(),
        };
        for root in roots {
            let id = container.add_node(root, None);
            container.top.push(id);
        }
        container
    }

    pub fn with_journal(mut self, journal: Journal, tag: &str) -> Self {
        self.journal = Some(journal);
        self.tag = tag.to_string();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn add_node(&mut self, node: &TreeNode, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(ArenaNode {
            name: node.name.clone(),
            active: node.active,
            parent,
            children: Vec::new(),
            slots: Vec::new(),
        });
        for component in &node.components {
            let slot = self.slots.len();
            self.slots.push(ArenaSlot {
                node: id,
                type_id: component.type_id.clone(),
                fields: component.fields.clone(),
            });
            self.nodes[id].slots.push(slot);
        }
        for child in &node.children {
            let child_id = self.add_node(child, Some(id));
            self.nodes[id].children.push(child_id);
        }
        id
    }

    pub fn to_roots(&self) -> Vec<TreeNode> {
        self.top.iter().map(|&id| self.node_to_tree(id)).collect()
    }

    fn node_to_tree(&self, id: usize) -> TreeNode {
        let node = &self.nodes[id];
        TreeNode {
            name: node.name.clone(),
            active: node.active,
            components: node
                .slots
                .iter()
                .map(|&slot| TreeComponent {
                    type_id: self.slots[slot].type_id.clone(),
                    fields: self.slots[slot].fields.clone(),
                })
                .collect(),
            children: node
                .children
                .iter()
                .map(|&child| self.node_to_tree(child))
                .collect(),
        }
    }

    fn effectively_active(&self, mut id: usize) -> bool {
        loop {
            let node = &self.nodes[id];
            if !node.active {
                return false;
            }
            match node.parent {
                Some(parent) => id = parent,
                None => return true,
            }
        }
    }

    fn log(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.borrow_mut().push(entry);
        }
    }
}

impl ContainerGraph for MemoryContainer {
    fn top_level(&self) -> Vec<NodeId> {
        self.top.iter().map(|&id| id as NodeId).collect()
    }

    fn node_name(&self, node: NodeId) -> String {
        self.nodes[node as usize].name.clone()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node as usize].parent.map(|id| id as NodeId)
    }

    fn sibling_index(&self, node: NodeId) -> usize {
        let id = node as usize;
        let siblings = match self.nodes[id].parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.top,
        };
        siblings.iter().position(|&sibling| sibling == id).unwrap()
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[node as usize]
            .children
            .get(index)
            .map(|&child| child as NodeId)
    }

    fn instances_of_type(&self, type_id: &str, include_inactive: bool) -> Vec<SlotId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.type_id == type_id)
            .filter(|(_, slot)| include_inactive || self.effectively_active(slot.node))
            .map(|(id, _)| id as SlotId)
            .collect()
    }

    fn slot_on_node(&self, node: NodeId, type_id: &str) -> Option<SlotId> {
        self.nodes[node as usize]
            .slots
            .iter()
            .find(|&&slot| self.slots[slot].type_id == type_id)
            .map(|&slot| slot as SlotId)
    }

    fn node_of(&self, slot: SlotId) -> NodeId {
        self.slots[slot as usize].node as NodeId
    }

    fn field_provenance(&self, slot: SlotId, field: &str) -> Option<FieldProvenance> {
        self.slots[slot as usize]
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, state)| state.provenance)
    }

    fn read_field(&self, slot: SlotId, field: &str) -> Option<Value> {
        self.slots[slot as usize]
            .fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, state)| state.value.clone())
    }
}

impl EditableContainer for MemoryContainer {
    fn write_field(&mut self, slot: SlotId, field: &str, value: Value) -> Result<(), HostError> {
        let fields = &mut self.slots[slot as usize].fields;
        match fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, state)) => state.value = value,
            None => fields.push((field.to_string(), FieldState::plain(value))),
        }
        Ok(())
    }

    fn commit_slot(&mut self, slot: SlotId) -> Result<(), HostError> {
        self.log(format!("commit:{}:{slot}", self.tag));
        Ok(())
    }

    fn record_template_divergence(&mut self, slot: SlotId) -> Result<(), HostError> {
        self.log(format!("divergence:{}:{slot}", self.tag));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PrefabAsset {
    pub kind: PrefabKind,
    pub root: TreeNode,
}

#[derive(Debug, Clone)]
pub struct RecordAsset {
    pub type_id: String,
    pub fields: Rc<RefCell<Vec<(String, FieldState)>>>,
}

/// Record handle sharing state with the store, the way a loaded data
/// asset is the store's own object.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    fields: Rc<RefCell<Vec<(String, FieldState)>>>,
}

impl FieldAccess for MemoryRecord {
    fn provenance(&self, field: &str) -> Option<FieldProvenance> {
        self.fields
            .borrow()
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, state)| state.provenance)
    }

    fn read(&self, field: &str) -> Option<Value> {
        self.fields
            .borrow()
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, state)| state.value.clone())
    }

    fn write(&mut self, field: &str, value: Value) -> Result<(), HostError> {
        let mut fields = self.fields.borrow_mut();
        match fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, state)) => state.value = value,
            None => fields.push((field.to_string(), FieldState::plain(value))),
        }
        Ok(())
    }
}

pub struct MemoryAssets {
    pub prefabs: BTreeMap<String, PrefabAsset>,
    pub records: BTreeMap<String, RecordAsset>,
    pub dirty_records: Vec<String>,
    pub save_all_calls: usize,
    /// Persisting this prefab path fails, for partial-failure tests.
    pub fail_persist: Option<String>,
    pub journal: Journal,
}

impl MemoryAssets {
    pub fn new(journal: Journal) -> Self {
        MemoryAssets {
            prefabs: BTreeMap::new(),
            records: BTreeMap::new(),
            dirty_records: Vec::new(),
            save_all_calls: 0,
            fail_persist: None,
            journal,
        }
    }

    pub fn add_prefab(&mut self, path: &str, kind: PrefabKind, root: TreeNode) {
        self.prefabs
            .insert(path.to_string(), PrefabAsset { kind, root });
    }

    pub fn add_record(&mut self, path: &str, type_id: &str, fields: Vec<(String, FieldState)>) {
        self.records.insert(
            path.to_string(),
            RecordAsset {
                type_id: type_id.to_string(),
                fields: Rc::new(RefCell::new(fields)),
            },
        );
    }

    /// Read a field from a prefab as currently persisted.
    pub fn prefab_field(&self, path: &str, node: &str, type_id: &str, field: &str) -> Option<Value> {
        let asset = self.prefabs.get(path)?;
        field_value(std::slice::from_ref(&asset.root), node, type_id, field)
    }

    /// Read a field from a record as currently stored.
    pub fn record_field(&self, path: &str, field: &str) -> Option<Value> {
        let asset = self.records.get(path)?;
        let fields = asset.fields.borrow();
        fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, state)| state.value.clone())
    }

    fn log(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }
}

impl AssetStore for MemoryAssets {
    type Contents = MemoryContainer;
    type Record = MemoryRecord;

    fn find_prefab_paths(&self) -> Vec<String> {
        self.prefabs.keys().cloned().collect()
    }

    fn prefab_kind(&self, path: &str) -> Result<PrefabKind, HostError> {
        self.prefabs
            .get(path)
            .map(|asset| asset.kind)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))
    }

    fn load_prefab(&self, path: &str) -> Result<MemoryContainer, HostError> {
        let asset = self
            .prefabs
            .get(path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        Ok(MemoryContainer::from_roots(std::slice::from_ref(
            &asset.root,
        )))
    }

    fn open_prefab_contents(&mut self, path: &str) -> Result<MemoryContainer, HostError> {
        let asset = self
            .prefabs
            .get(path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        self.log(format!("open_prefab:{path}"));
        Ok(
            MemoryContainer::from_roots(std::slice::from_ref(&asset.root))
                .with_journal(self.journal.clone(), path),
        )
    }

    fn persist_prefab(&mut self, path: &str, contents: &MemoryContainer) -> Result<(), HostError> {
        if self.fail_persist.as_deref() == Some(path) {
            return Err(HostError::PersistFailed {
                path: path.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let asset = self
            .prefabs
            .get_mut(path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        let mut roots = contents.to_roots();
        asset.root = roots.remove(0);
        self.log(format!("persist_prefab:{path}"));
        Ok(())
    }

    fn release_prefab(&mut self, contents: MemoryContainer) {
        self.log(format!("release_prefab:{}", contents.tag()));
    }

    fn find_records_of_type(&self, type_id: &str) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, asset)| asset.type_id == type_id)
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn load_record(&mut self, path: &str) -> Result<MemoryRecord, HostError> {
        let asset = self
            .records
            .get(path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        self.log(format!("load_record:{path}"));
        Ok(MemoryRecord {
            fields: Rc::clone(&asset.fields),
        })
    }

    fn mark_record_dirty(&mut self, path: &str) -> Result<(), HostError> {
        if !self.records.contains_key(path) {
            return Err(HostError::AssetNotFound(path.to_string()));
        }
        self.dirty_records.push(path.to_string());
        self.log(format!("mark_record_dirty:{path}"));
        Ok(())
    }

    fn save_all(&mut self) -> Result<(), HostError> {
        self.save_all_calls += 1;
        self.log("save_all".to_string());
        Ok(())
    }
}

pub struct MemoryScenes {
    pub scenes: Vec<(String, Vec<TreeNode>)>,
    pub active: String,
    pub opened: Vec<String>,
    pub modified: Vec<String>,
    pub saved: Vec<String>,
    /// Opening this scene path fails, for restore-on-error tests.
    pub fail_open: Option<String>,
    pub journal: Journal,
}

impl MemoryScenes {
    /// The initially active scene is registered with an empty entity list
    /// so restores always have a target.
    pub fn new(journal: Journal, active: &str) -> Self {
        MemoryScenes {
            scenes: vec![(active.to_string(), Vec::new())],
            active: active.to_string(),
            opened: Vec::new(),
            modified: Vec::new(),
            saved: Vec::new(),
            fail_open: None,
            journal,
        }
    }

    pub fn add_scene(&mut self, path: &str, roots: Vec<TreeNode>) {
        self.scenes.push((path.to_string(), roots));
    }

    pub fn scene_field(&self, path: &str, node: &str, type_id: &str, field: &str) -> Option<Value> {
        let (_, roots) = self.scenes.iter().find(|(scene, _)| scene == path)?;
        field_value(roots, node, type_id, field)
    }

    fn log(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }
}

impl SceneHost for MemoryScenes {
    type Scene = MemoryContainer;

    /// Configured scenes, excluding the bootstrap entry for the initially
    /// active scene.
    fn configured_scene_paths(&self) -> Vec<String> {
        self.scenes
            .iter()
            .skip(1)
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn active_scene_path(&self) -> String {
        self.active.clone()
    }

    fn open_scene(&mut self, path: &str) -> Result<MemoryContainer, HostError> {
        if self.fail_open.as_deref() == Some(path) {
            return Err(HostError::LoadFailed {
                path: path.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let (_, roots) = self
            .scenes
            .iter()
            .find(|(scene, _)| scene == path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        let container = MemoryContainer::from_roots(roots).with_journal(self.journal.clone(), path);
        self.active = path.to_string();
        self.opened.push(path.to_string());
        self.log(format!("open_scene:{path}"));
        Ok(container)
    }

    fn mark_scene_modified(&mut self, path: &str) -> Result<(), HostError> {
        self.modified.push(path.to_string());
        self.log(format!("mark_scene_modified:{path}"));
        Ok(())
    }

    fn save_scene(&mut self, path: &str, scene: &MemoryContainer) -> Result<(), HostError> {
        let entry = self
            .scenes
            .iter_mut()
            .find(|(scene_path, _)| scene_path == path)
            .ok_or_else(|| HostError::AssetNotFound(path.to_string()))?;
        entry.1 = scene.to_roots();
        self.saved.push(path.to_string());
        self.log(format!("save_scene:{path}"));
        Ok(())
    }
}
