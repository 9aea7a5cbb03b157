//! Static registry of migratable types.
//!
//! Hosts declare, at startup, which types carry migratable fields and how
//! each field moves: the original field name, the target field name, the
//! generic type arguments some strategies need, and the id of the
//! conversion strategy to run. `scan` hands the plan builder the full
//! declaration set in registration order.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque handle to a structural type. Lookup key and display name only;
/// the engine never inspects the type it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDescriptor(String);

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        TypeDescriptor(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeDescriptor {
    fn from(name: &str) -> Self {
        TypeDescriptor(name.to_string())
    }
}

impl From<String> for TypeDescriptor {
    fn from(name: String) -> Self {
        TypeDescriptor(name)
    }
}

/// Which universe a registered type's instances live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Instances sit on entities inside prefab containers and scenes.
    Component,
    /// Each instance is a standalone data asset of its own.
    Record,
}

/// One field's migration declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMigrationSpec {
    pub original_field: String,
    pub target_field: String,
    /// Generic type arguments of the original field, for strategies that
    /// need the wrapped element type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_arguments: Vec<TypeDescriptor>,
    /// Strategy registry id.
    pub strategy: String,
}

impl FieldMigrationSpec {
    pub fn new(
        original_field: impl Into<String>,
        target_field: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Self {
        FieldMigrationSpec {
            original_field: original_field.into(),
            target_field: target_field.into(),
            type_arguments: Vec::new(),
            strategy: strategy.into(),
        }
    }

    pub fn with_type_argument(mut self, descriptor: impl Into<TypeDescriptor>) -> Self {
        self.type_arguments.push(descriptor.into());
        self
    }
}

/// Everything registered for one type: its universe and its ordered field
/// specs.
#[derive(Debug, Clone)]
pub struct TypeMetadata {
    pub kind: TypeKind,
    pub fields: Vec<FieldMigrationSpec>,
}

/// Builder for one type's registration.
#[derive(Debug, Clone)]
pub struct TypeRegistration {
    descriptor: TypeDescriptor,
    kind: TypeKind,
    fields: Vec<FieldMigrationSpec>,
}

impl TypeRegistration {
    pub fn component(descriptor: impl Into<TypeDescriptor>) -> Self {
        TypeRegistration {
            descriptor: descriptor.into(),
            kind: TypeKind::Component,
            fields: Vec::new(),
        }
    }

    pub fn record(descriptor: impl Into<TypeDescriptor>) -> Self {
        TypeRegistration {
            descriptor: descriptor.into(),
            kind: TypeKind::Record,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldMigrationSpec) -> Self {
        self.fields.push(spec);
        self
    }
}

/// Registry of migratable types, scanned by the plan builder.
///
/// Written once when the host wires itself up (or rebuilt wholesale on a
/// refresh), then read many times. Registration order is the scan order.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    types: IndexMap<TypeDescriptor, TypeMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        MetadataRegistry::default()
    }

    /// Declare one type. Registering a descriptor again replaces its
    /// previous declaration.
    pub fn register(&mut self, registration: TypeRegistration) {
        let TypeRegistration {
            descriptor,
            kind,
            fields,
        } = registration;
        self.types.insert(descriptor, TypeMetadata { kind, fields });
    }

    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<&TypeMetadata> {
        self.types.get(descriptor)
    }

    /// Registered types with at least one migratable field, in
    /// registration order. Pure read; unknown strategy ids surface later,
    /// at plan-build time.
    pub fn scan(&self) -> impl Iterator<Item = (&TypeDescriptor, &TypeMetadata)> {
        self.types
            .iter()
            .filter(|(_, meta)| !meta.fields.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}
