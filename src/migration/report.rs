//! Read-only presentation rows over a migration plan.
//!
//! A UI layer renders these verbatim: three depths (asset, instance,
//! field) with an icon hint per row. No core logic leaks into the
//! presentation side.

use std::path::Path;

use serde::Serialize;

use super::plan::{MigrationPlan, UpgradableComponent, UpgradableField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IconHint {
    Prefab,
    PrefabVariant,
    Scene,
    Record,
    Component,
    Field,
    /// Field value locally overrides its template.
    FieldOverride,
    /// Field value inherited unchanged from a template.
    FieldTemplateDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRow {
    pub label: String,
    pub depth: u8,
    pub icon: IconHint,
}

/// Flatten a plan into display rows: prefabs, then scenes, then records.
pub fn plan_rows(plan: &MigrationPlan) -> Vec<PlanRow> {
    let mut rows = Vec::new();

    for prefab in &plan.prefabs {
        rows.push(PlanRow {
            label: asset_label(&prefab.path),
            depth: 0,
            icon: if prefab.is_variant {
                IconHint::PrefabVariant
            } else {
                IconHint::Prefab
            },
        });
        push_component_rows(&mut rows, &prefab.components);
    }

    for scene in &plan.scenes {
        rows.push(PlanRow {
            label: asset_label(&scene.path),
            depth: 0,
            icon: IconHint::Scene,
        });
        push_component_rows(&mut rows, &scene.components);
    }

    for record in &plan.records {
        rows.push(PlanRow {
            label: asset_label(&record.path),
            depth: 0,
            icon: IconHint::Record,
        });
        rows.push(PlanRow {
            label: record.type_id.name().to_string(),
            depth: 1,
            icon: IconHint::Component,
        });
        for field in &record.fields {
            rows.push(field_row(field));
        }
    }

    rows
}

fn push_component_rows(rows: &mut Vec<PlanRow>, components: &[UpgradableComponent]) {
    for component in components {
        rows.push(PlanRow {
            label: format!("{} ({})", component.type_id, component.owner),
            depth: 1,
            icon: IconHint::Component,
        });
        for field in &component.fields {
            rows.push(field_row(field));
        }
    }
}

fn field_row(field: &UpgradableField) -> PlanRow {
    let icon = if field.is_override {
        IconHint::FieldOverride
    } else if field.is_default_from_prefab {
        IconHint::FieldTemplateDefault
    } else {
        IconHint::Field
    };
    PlanRow {
        label: format!(
            "{} -> {} ({})",
            field.original_field,
            field.target_field,
            field.strategy.id()
        ),
        depth: 2,
        icon,
    }
}

/// `Stem (full/path)`, falling back to the raw path when it has no stem.
fn asset_label(path: &str) -> String {
    match Path::new(path).file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => format!("{stem} ({path})"),
        None => path.to_string(),
    }
}
