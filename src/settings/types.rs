//! Raw settings types matching the JSON settings document (`models[]`, `enums[]`).

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_id_field() -> String {
    "id".into()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    #[serde(default)]
    pub models: Vec<AdminModel>,
    #[serde(default)]
    pub enums: Vec<AdminEnum>,
}

impl AdminSettings {
    pub fn model(&self, name: &str) -> Option<&AdminModel> {
        self.models.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEnum {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub display_fields: Vec<String>,
    #[serde(default = "default_true")]
    pub can_create: bool,
    #[serde(default = "default_true")]
    pub can_update: bool,
    #[serde(default = "default_true")]
    pub can_delete: bool,
    #[serde(default)]
    pub fields: Vec<AdminField>,
}

impl AdminModel {
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&AdminField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Scalar,
    Enum,
    #[serde(alias = "object")]
    Relation,
}

/// Operations a field can be shown for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOperation {
    Read,
    Create,
    Update,
    Filter,
    Sort,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldVisibility {
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default = "default_true")]
    pub create: bool,
    #[serde(default = "default_true")]
    pub update: bool,
    #[serde(default = "default_true")]
    pub filter: bool,
    #[serde(default = "default_true")]
    pub sort: bool,
}

impl Default for FieldVisibility {
    fn default() -> Self {
        FieldVisibility {
            read: true,
            create: true,
            update: true,
            filter: true,
            sort: true,
        }
    }
}

impl FieldVisibility {
    pub fn allows(&self, op: FieldOperation) -> bool {
        match op {
            FieldOperation::Read => self.read,
            FieldOperation::Create => self.create,
            FieldOperation::Update => self.update,
            FieldOperation::Filter => self.filter,
            FieldOperation::Sort => self.sort,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    /// Scalar type name, enum name, or related model name depending on `kind`.
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// PostgreSQL type override for casts (e.g. "uuid", "varchar").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_type: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_id: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub has_default_value: bool,
    #[serde(default)]
    pub is_updated_at: bool,
    #[serde(default)]
    pub visibility: FieldVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
}

impl AdminField {
    /// Plain scalar field, as produced by settings regeneration.
    pub fn scalar(name: &str, type_: &str) -> Self {
        AdminField {
            name: name.to_string(),
            title: None,
            kind: FieldKind::Scalar,
            type_: type_.to_string(),
            column: None,
            native_type: None,
            is_required: false,
            is_unique: false,
            is_list: false,
            is_id: false,
            is_read_only: false,
            has_default_value: false,
            is_updated_at: false,
            visibility: FieldVisibility::default(),
            relation: None,
            validation: None,
        }
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn is_relation(&self) -> bool {
        self.kind == FieldKind::Relation
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTable {
    pub name: String,
    /// Column referencing this side's id.
    pub column: String,
    /// Column referencing the related model's id.
    pub inverse_column: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationDisplayMode {
    Link,
    Dropdown,
    Badge,
    Inline,
    Count,
    Tags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationEditMode {
    Select,
    Multiselect,
    Autocomplete,
    Readonly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationAction {
    Filter,
    View,
    Edit,
    ViewAll,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Foreign-key fields on this model (set on the owning side only).
    #[serde(default)]
    pub from_fields: Vec<String>,
    /// Fields on the related model referenced by `from_fields`.
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<RelationDisplayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_mode: Option<RelationEditMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<RelationAction>>,
    #[serde(default)]
    pub preview_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_defaults() {
        let f: AdminField = serde_json::from_value(serde_json::json!({
            "name": "title",
            "type": "String"
        }))
        .unwrap();
        assert_eq!(f.kind, FieldKind::Scalar);
        assert!(f.visibility.allows(FieldOperation::Filter));
        assert_eq!(f.column_name(), "title");
        assert!(f.relation.is_none());
    }

    #[test]
    fn object_kind_is_relation() {
        let f: AdminField = serde_json::from_value(serde_json::json!({
            "name": "author",
            "kind": "object",
            "type": "User",
            "relation": { "fromFields": ["authorId"], "references": ["id"], "displayMode": "badge" }
        }))
        .unwrap();
        assert!(f.is_relation());
        let rel = f.relation.unwrap();
        assert_eq!(rel.display_mode, Some(RelationDisplayMode::Badge));
        assert_eq!(rel.from_fields, vec!["authorId"]);
    }

    #[test]
    fn model_defaults() {
        let m: AdminModel = serde_json::from_value(serde_json::json!({ "name": "Post" })).unwrap();
        assert_eq!(m.id_field, "id");
        assert!(m.can_create && m.can_update && m.can_delete);
        assert_eq!(m.title(), "Post");
        assert_eq!(m.table(), "Post");
    }
}
