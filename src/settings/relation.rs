//! Relation cardinality and the display/edit/action choices each cardinality permits.
//!
//! Persisted choices that are not valid for a relation's cardinality are coerced
//! to the first valid option instead of being rejected.

use crate::settings::types::{
    AdminField, AdminSettings, RelationAction, RelationDisplayMode, RelationEditMode, RelationSettings,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationCardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

const SINGLE_DISPLAY: &[RelationDisplayMode] = &[
    RelationDisplayMode::Link,
    RelationDisplayMode::Dropdown,
    RelationDisplayMode::Badge,
    RelationDisplayMode::Inline,
];
const MULTI_DISPLAY: &[RelationDisplayMode] = &[
    RelationDisplayMode::Count,
    RelationDisplayMode::Tags,
    RelationDisplayMode::Inline,
];
const SINGLE_EDIT: &[RelationEditMode] = &[
    RelationEditMode::Select,
    RelationEditMode::Autocomplete,
    RelationEditMode::Readonly,
];
const MULTI_EDIT: &[RelationEditMode] = &[
    RelationEditMode::Multiselect,
    RelationEditMode::Autocomplete,
    RelationEditMode::Readonly,
];
const SINGLE_ACTIONS: &[RelationAction] = &[RelationAction::Filter, RelationAction::View, RelationAction::Edit];
const ONE_TO_MANY_ACTIONS: &[RelationAction] = &[RelationAction::ViewAll];
const MANY_TO_MANY_ACTIONS: &[RelationAction] = &[RelationAction::ViewAll, RelationAction::Filter];

impl RelationCardinality {
    pub const ALL: [RelationCardinality; 4] = [
        RelationCardinality::OneToOne,
        RelationCardinality::ManyToOne,
        RelationCardinality::OneToMany,
        RelationCardinality::ManyToMany,
    ];

    pub fn is_multi(self) -> bool {
        matches!(self, RelationCardinality::OneToMany | RelationCardinality::ManyToMany)
    }

    pub fn valid_display_modes(self) -> &'static [RelationDisplayMode] {
        if self.is_multi() {
            MULTI_DISPLAY
        } else {
            SINGLE_DISPLAY
        }
    }

    pub fn valid_edit_modes(self) -> &'static [RelationEditMode] {
        if self.is_multi() {
            MULTI_EDIT
        } else {
            SINGLE_EDIT
        }
    }

    pub fn valid_actions(self) -> &'static [RelationAction] {
        match self {
            RelationCardinality::OneToOne | RelationCardinality::ManyToOne => SINGLE_ACTIONS,
            RelationCardinality::OneToMany => ONE_TO_MANY_ACTIONS,
            RelationCardinality::ManyToMany => MANY_TO_MANY_ACTIONS,
        }
    }

    pub fn default_actions(self) -> Vec<RelationAction> {
        if self.is_multi() {
            vec![RelationAction::ViewAll]
        } else {
            vec![RelationAction::View]
        }
    }
}

/// Classify a relation field from its own list flag and its opposite field's list flag.
/// Without an opposite field, a foreign key on this side means many-to-one.
pub fn cardinality(field: &AdminField, opposite: Option<&AdminField>) -> RelationCardinality {
    let has_fk = field
        .relation
        .as_ref()
        .map(|r| !r.from_fields.is_empty())
        .unwrap_or(false);
    match (field.is_list, opposite.map(|o| o.is_list)) {
        (true, Some(true)) => RelationCardinality::ManyToMany,
        (true, _) => RelationCardinality::OneToMany,
        (false, Some(true)) => RelationCardinality::ManyToOne,
        (false, Some(false)) => RelationCardinality::OneToOne,
        (false, None) if has_fk => RelationCardinality::ManyToOne,
        (false, None) => RelationCardinality::OneToOne,
    }
}

/// Find the field on the related model that points back at `model_name` through the same relation.
pub fn opposite_field<'a>(
    settings: &'a AdminSettings,
    model_name: &str,
    field: &AdminField,
) -> Option<&'a AdminField> {
    let related = settings.model(&field.type_)?;
    let rel_name = field.relation.as_ref().and_then(|r| r.name.as_deref());
    related.fields.iter().find(|candidate| {
        if !candidate.is_relation() || candidate.type_ != model_name {
            return false;
        }
        // Self-relation: the same field is not its own opposite.
        if related.name == model_name && candidate.name == field.name {
            return false;
        }
        let candidate_name = candidate.relation.as_ref().and_then(|r| r.name.as_deref());
        match (rel_name, candidate_name) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    })
}

/// Effective presentation of a relation field after coercion.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationPresentation {
    pub cardinality: RelationCardinality,
    pub display_mode: RelationDisplayMode,
    pub edit_mode: RelationEditMode,
    pub actions: Vec<RelationAction>,
}

pub fn coerce_display_mode(
    cardinality: RelationCardinality,
    requested: Option<RelationDisplayMode>,
) -> RelationDisplayMode {
    let valid = cardinality.valid_display_modes();
    requested.filter(|m| valid.contains(m)).unwrap_or(valid[0])
}

pub fn coerce_edit_mode(cardinality: RelationCardinality, requested: Option<RelationEditMode>) -> RelationEditMode {
    let valid = cardinality.valid_edit_modes();
    requested.filter(|m| valid.contains(m)).unwrap_or(valid[0])
}

pub fn coerce_actions(cardinality: RelationCardinality, requested: Option<&[RelationAction]>) -> Vec<RelationAction> {
    let valid = cardinality.valid_actions();
    let Some(requested) = requested else {
        return cardinality.default_actions();
    };
    let mut out: Vec<RelationAction> = Vec::with_capacity(requested.len());
    for a in requested {
        if valid.contains(a) && !out.contains(a) {
            out.push(*a);
        }
    }
    if out.is_empty() && !requested.is_empty() {
        out.push(valid[0]);
    }
    out
}

pub fn validate_relation(
    cardinality: RelationCardinality,
    settings: Option<&RelationSettings>,
) -> RelationPresentation {
    RelationPresentation {
        cardinality,
        display_mode: coerce_display_mode(cardinality, settings.and_then(|s| s.display_mode)),
        edit_mode: coerce_edit_mode(cardinality, settings.and_then(|s| s.edit_mode)),
        actions: coerce_actions(cardinality, settings.and_then(|s| s.actions.as_deref())),
    }
}
