//! Resolved settings: validated and flattened for runtime use (columns, casts, relation join paths).

use crate::error::ConfigError;
use crate::settings::relation::{cardinality, opposite_field, validate_relation, RelationCardinality, RelationPresentation};
use crate::settings::{validate, AdminField, AdminModel, AdminSettings, FieldKind, FieldVisibility, ValidationRule};
use std::collections::HashMap;

/// Scalar type of a column, derived from the field's kind and type name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Json,
    Bytes,
    Enum(String),
}

impl ScalarType {
    pub fn from_field(field: &AdminField) -> ScalarType {
        if field.kind == FieldKind::Enum {
            return ScalarType::Enum(field.type_.clone());
        }
        match field.type_.as_str() {
            "Int" => ScalarType::Int,
            "BigInt" => ScalarType::BigInt,
            "Float" => ScalarType::Float,
            "Decimal" => ScalarType::Decimal,
            "Boolean" => ScalarType::Boolean,
            "DateTime" => ScalarType::DateTime,
            "Json" => ScalarType::Json,
            "Bytes" => ScalarType::Bytes,
            _ => ScalarType::String,
        }
    }

    /// PostgreSQL type used for parameter casts.
    fn pg_type(&self, schema: &str) -> String {
        match self {
            ScalarType::String => "text".into(),
            ScalarType::Int => "int4".into(),
            ScalarType::BigInt => "int8".into(),
            ScalarType::Float => "float8".into(),
            ScalarType::Decimal => "numeric".into(),
            ScalarType::Boolean => "bool".into(),
            ScalarType::DateTime => "timestamp".into(),
            ScalarType::Json => "jsonb".into(),
            ScalarType::Bytes => "bytea".into(),
            ScalarType::Enum(name) => format!("\"{}\".\"{}\"", schema.replace('"', "\"\""), name.replace('"', "\"\"")),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::BigInt | ScalarType::Float | ScalarType::Decimal)
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    /// Field name exposed by the API.
    pub field: String,
    /// Database column name.
    pub column: String,
    pub title: String,
    pub scalar: ScalarType,
    /// PostgreSQL type for casts; lists carry the `[]` suffix.
    pub pg_type: String,
    pub required: bool,
    pub has_default: bool,
    pub is_id: bool,
    pub is_list: bool,
    pub is_updated_at: bool,
    pub read_only: bool,
    pub visibility: FieldVisibility,
    pub validation: Option<ValidationRule>,
}

impl ColumnInfo {
    /// `time`/`timetz` columns: date-time fields holding only a time of day.
    pub fn is_time_of_day(&self) -> bool {
        self.scalar == ScalarType::DateTime && matches!(self.pg_type.trim_end_matches("[]"), "time" | "timetz")
    }
}

/// How a relation reaches its target rows.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationLink {
    /// This side holds the foreign key: pairs of (our column, their column).
    Forward { pairs: Vec<(String, String)> },
    /// The related side holds the foreign key: pairs of (our column, their column).
    Backward { pairs: Vec<(String, String)> },
    /// Rows are linked through a join table.
    JoinTable {
        table: String,
        our_column: String,
        their_column: String,
    },
}

#[derive(Clone, Debug)]
pub struct RelationInfo {
    pub field: String,
    pub title: String,
    /// Related model name.
    pub target: String,
    pub link: RelationLink,
    pub presentation: RelationPresentation,
    /// Related fields shown in previews (falls back to the target's display fields).
    pub preview_fields: Vec<String>,
    /// Forward-link field names on this model (foreign-key fields).
    pub from_fields: Vec<String>,
    pub required: bool,
    pub visibility: FieldVisibility,
}

impl RelationInfo {
    pub fn cardinality(&self) -> RelationCardinality {
        self.presentation.cardinality
    }

    pub fn is_multi(&self) -> bool {
        self.cardinality().is_multi()
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub title: String,
    pub schema_name: String,
    pub table_name: String,
    pub id_field: String,
    pub display_fields: Vec<String>,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<RelationInfo>,
    /// Readable scalar and enum fields used for free-text search.
    pub search_fields: Vec<AdminField>,
}

impl ResolvedEntity {
    pub fn column(&self, field: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn relation(&self, field: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.field == field)
    }

    pub fn id_column(&self) -> &ColumnInfo {
        // resolve() guarantees the id column exists
        self.columns
            .iter()
            .find(|c| c.field == self.id_field)
            .unwrap_or(&self.columns[0])
    }

}

#[derive(Clone, Debug, Default)]
pub struct ResolvedSettings {
    pub entities: Vec<ResolvedEntity>,
    entity_index: HashMap<String, usize>,
    pub enums: HashMap<String, Vec<String>>,
}

impl ResolvedSettings {
    /// Look up by exact model name, then case-insensitively (URL segments are often lowercase).
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_index
            .get(name)
            .map(|i| &self.entities[*i])
            .or_else(|| self.entities.iter().find(|e| e.name.eq_ignore_ascii_case(name)))
    }
}

/// Build resolved settings (validates first). Models without an explicit schema use `default_schema`.
pub fn resolve(settings: &AdminSettings, default_schema: &str) -> Result<ResolvedSettings, ConfigError> {
    validate(settings)?;

    let mut entities = Vec::with_capacity(settings.models.len());
    for model in &settings.models {
        entities.push(resolve_model(settings, model, default_schema)?);
    }
    let entity_index = entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.clone(), i))
        .collect();
    let enums = settings
        .enums
        .iter()
        .map(|e| (e.name.clone(), e.fields.clone()))
        .collect();

    Ok(ResolvedSettings {
        entities,
        entity_index,
        enums,
    })
}

fn resolve_model(settings: &AdminSettings, model: &AdminModel, default_schema: &str) -> Result<ResolvedEntity, ConfigError> {
    let schema = model.schema.as_deref().unwrap_or(default_schema);

    let columns: Vec<ColumnInfo> = model
        .fields
        .iter()
        .filter(|f| !f.is_relation())
        .map(|f| {
            let scalar = ScalarType::from_field(f);
            let base = f.native_type.clone().unwrap_or_else(|| scalar.pg_type(schema));
            ColumnInfo {
                field: f.name.clone(),
                column: f.column_name().to_string(),
                title: field_title(f),
                pg_type: if f.is_list { format!("{}[]", base) } else { base },
                scalar,
                required: f.is_required,
                has_default: f.has_default_value || f.is_updated_at,
                is_id: f.is_id || f.name == model.id_field,
                is_list: f.is_list,
                is_updated_at: f.is_updated_at,
                read_only: f.is_read_only,
                visibility: f.visibility.clone(),
                validation: f.validation.clone(),
            }
        })
        .collect();

    let mut relations = Vec::new();
    for f in model.fields.iter().filter(|f| f.is_relation()) {
        let opposite = opposite_field(settings, &model.name, f);
        let card = cardinality(f, opposite);
        let link = resolve_link(settings, model, f, opposite, card)?;
        let rel = f.relation.as_ref();
        let preview_fields = match rel.map(|r| r.preview_fields.clone()) {
            Some(p) if !p.is_empty() => p,
            _ => settings
                .model(&f.type_)
                .map(|t| t.display_fields.clone())
                .unwrap_or_default(),
        };
        relations.push(RelationInfo {
            field: f.name.clone(),
            title: field_title(f),
            target: f.type_.clone(),
            link,
            presentation: validate_relation(card, rel),
            preview_fields,
            from_fields: rel.map(|r| r.from_fields.clone()).unwrap_or_default(),
            required: f.is_required,
            visibility: f.visibility.clone(),
        });
    }

    let search_fields = model
        .fields
        .iter()
        .filter(|f| !f.is_relation() && !f.is_list && f.visibility.read)
        .cloned()
        .collect();

    Ok(ResolvedEntity {
        name: model.name.clone(),
        title: model.title().to_string(),
        schema_name: schema.to_string(),
        table_name: model.table().to_string(),
        id_field: model.id_field.clone(),
        display_fields: model.display_fields.clone(),
        can_create: model.can_create,
        can_update: model.can_update,
        can_delete: model.can_delete,
        columns,
        relations,
        search_fields,
    })
}

fn field_title(f: &AdminField) -> String {
    f.title.clone().unwrap_or_else(|| crate::case::humanize(&f.name))
}

fn column_of(model: &AdminModel, field: &str) -> Result<String, ConfigError> {
    model
        .field(field)
        .map(|f| f.column_name().to_string())
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "field",
            id: format!("{}.{}", model.name, field),
        })
}

fn resolve_link(
    settings: &AdminSettings,
    model: &AdminModel,
    field: &AdminField,
    opposite: Option<&AdminField>,
    card: RelationCardinality,
) -> Result<RelationLink, ConfigError> {
    let target = settings.model(&field.type_).ok_or_else(|| ConfigError::MissingReference {
        kind: "model",
        id: field.type_.clone(),
    })?;
    let rel = field.relation.clone().unwrap_or_default();

    if card == RelationCardinality::ManyToMany {
        if let Some(jt) = &rel.join_table {
            return Ok(RelationLink::JoinTable {
                table: jt.name.clone(),
                our_column: jt.column.clone(),
                their_column: jt.inverse_column.clone(),
            });
        }
        if model.name == target.name {
            return Err(ConfigError::Validation(format!(
                "{}.{}: self many-to-many relations need an explicit joinTable",
                model.name, field.name
            )));
        }
        // Implicit join table: `_<RelationName>` with column A for the alphabetically first model.
        let relation_name = rel
            .name
            .clone()
            .or_else(|| opposite.and_then(|o| o.relation.as_ref()).and_then(|r| r.name.clone()))
            .unwrap_or_else(|| {
                let mut names = [model.name.as_str(), target.name.as_str()];
                names.sort();
                format!("{}To{}", names[0], names[1])
            });
        let (our_column, their_column) = if model.name < target.name {
            ("A", "B")
        } else {
            ("B", "A")
        };
        return Ok(RelationLink::JoinTable {
            table: format!("_{}", relation_name),
            our_column: our_column.into(),
            their_column: their_column.into(),
        });
    }

    if !rel.from_fields.is_empty() {
        let mut pairs = Vec::with_capacity(rel.from_fields.len());
        for (ours, theirs) in rel.from_fields.iter().zip(&rel.references) {
            pairs.push((column_of(model, ours)?, column_of(target, theirs)?));
        }
        return Ok(RelationLink::Forward { pairs });
    }

    let opposite_rel = opposite.and_then(|o| o.relation.as_ref()).filter(|r| !r.from_fields.is_empty());
    let Some(opposite_rel) = opposite_rel else {
        return Err(ConfigError::Validation(format!(
            "{}.{}: relation has no foreign key on either side",
            model.name, field.name
        )));
    };
    let mut pairs = Vec::with_capacity(opposite_rel.from_fields.len());
    for (theirs, ours) in opposite_rel.from_fields.iter().zip(&opposite_rel.references) {
        pairs.push((column_of(model, ours)?, column_of(target, theirs)?));
    }
    Ok(RelationLink::Backward { pairs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RelationDisplayMode;
    use serde_json::json;

    fn blog() -> AdminSettings {
        serde_json::from_value(json!({
            "models": [
                { "name": "User", "tableName": "users", "displayFields": ["email"], "fields": [
                    { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                    { "name": "email", "type": "String", "isRequired": true, "isUnique": true },
                    { "name": "role", "kind": "enum", "type": "Role" },
                    { "name": "posts", "kind": "relation", "type": "Post", "isList": true,
                      "relation": { "displayMode": "link" } }
                ]},
                { "name": "Post", "fields": [
                    { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                    { "name": "title", "type": "String", "isRequired": true },
                    { "name": "authorId", "type": "Int", "column": "author_id" },
                    { "name": "author", "kind": "relation", "type": "User",
                      "relation": { "fromFields": ["authorId"], "references": ["id"] } },
                    { "name": "tags", "kind": "relation", "type": "Tag", "isList": true }
                ]},
                { "name": "Tag", "fields": [
                    { "name": "id", "type": "Int", "isId": true },
                    { "name": "label", "type": "String" },
                    { "name": "posts", "kind": "relation", "type": "Post", "isList": true }
                ]}
            ],
            "enums": [{ "name": "Role", "fields": ["ADMIN", "USER"] }]
        }))
        .unwrap()
    }

    #[test]
    fn resolves_columns_and_types() {
        let r = resolve(&blog(), "public").unwrap();
        let user = r.entity("User").unwrap();
        assert_eq!(user.table_name, "users");
        assert_eq!(user.schema_name, "public");
        let role = user.column("role").unwrap();
        assert_eq!(role.scalar, ScalarType::Enum("Role".into()));
        assert_eq!(role.pg_type, "\"public\".\"Role\"");
        assert_eq!(user.id_column().field, "id");
        assert!(r.entity("user").is_some());
    }

    #[test]
    fn resolves_relation_links() {
        let r = resolve(&blog(), "public").unwrap();
        let post = r.entity("Post").unwrap();
        let author = post.relation("author").unwrap();
        assert_eq!(author.cardinality(), RelationCardinality::ManyToOne);
        assert_eq!(
            author.link,
            RelationLink::Forward {
                pairs: vec![("author_id".into(), "id".into())]
            }
        );
        assert_eq!(author.preview_fields, vec!["email"]);

        let user = r.entity("User").unwrap();
        let posts = user.relation("posts").unwrap();
        assert_eq!(posts.cardinality(), RelationCardinality::OneToMany);
        assert_eq!(
            posts.link,
            RelationLink::Backward {
                pairs: vec![("id".into(), "author_id".into())]
            }
        );
        // "link" is not valid for a one-to-many relation
        assert_eq!(posts.presentation.display_mode, RelationDisplayMode::Count);

        let tags = post.relation("tags").unwrap();
        assert_eq!(
            tags.link,
            RelationLink::JoinTable {
                table: "_PostToTag".into(),
                our_column: "A".into(),
                their_column: "B".into()
            }
        );
        let tag_posts = r.entity("Tag").unwrap().relation("posts").unwrap();
        assert_eq!(
            tag_posts.link,
            RelationLink::JoinTable {
                table: "_PostToTag".into(),
                our_column: "B".into(),
                their_column: "A".into()
            }
        );
    }

    #[test]
    fn search_fields_exclude_relations() {
        let r = resolve(&blog(), "public").unwrap();
        let names: Vec<_> = r.entity("Post").unwrap().search_fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title", "authorId"]);
    }
}
