//! Settings validation: referential integrity between models, fields and enums.

use crate::error::ConfigError;
use crate::settings::{AdminSettings, FieldKind};
use std::collections::HashSet;

pub fn validate(settings: &AdminSettings) -> Result<(), ConfigError> {
    let mut enum_names = HashSet::new();
    for e in &settings.enums {
        if !enum_names.insert(e.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "enum",
                name: e.name.clone(),
            });
        }
    }

    let mut model_names = HashSet::new();
    for m in &settings.models {
        if !model_names.insert(m.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "model",
                name: m.name.clone(),
            });
        }
    }

    for m in &settings.models {
        let mut field_names = HashSet::new();
        for f in &m.fields {
            if !field_names.insert(f.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "field",
                    name: format!("{}.{}", m.name, f.name),
                });
            }
        }

        match m.field(&m.id_field) {
            Some(f) if f.kind != FieldKind::Relation && !f.is_list => {}
            _ => {
                return Err(ConfigError::InvalidIdField {
                    model: m.name.clone(),
                    field: m.id_field.clone(),
                })
            }
        }

        for name in &m.display_fields {
            if m.field(name).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "display field",
                    id: format!("{}.{}", m.name, name),
                });
            }
        }

        for f in &m.fields {
            match f.kind {
                FieldKind::Enum => {
                    if !enum_names.contains(f.type_.as_str()) {
                        return Err(ConfigError::MissingReference {
                            kind: "enum",
                            id: f.type_.clone(),
                        });
                    }
                }
                FieldKind::Relation => {
                    let Some(target) = settings.model(&f.type_) else {
                        return Err(ConfigError::MissingReference {
                            kind: "model",
                            id: f.type_.clone(),
                        });
                    };
                    let Some(rel) = &f.relation else { continue };
                    if rel.from_fields.len() != rel.references.len() {
                        return Err(ConfigError::Validation(format!(
                            "{}.{}: fromFields and references must have the same length",
                            m.name, f.name
                        )));
                    }
                    for from in &rel.from_fields {
                        if m.field(from).is_none() {
                            return Err(ConfigError::MissingReference {
                                kind: "field",
                                id: format!("{}.{}", m.name, from),
                            });
                        }
                    }
                    for reference in rel.references.iter().chain(&rel.preview_fields) {
                        if target.field(reference).is_none() {
                            return Err(ConfigError::MissingReference {
                                kind: "field",
                                id: format!("{}.{}", target.name, reference),
                            });
                        }
                    }
                }
                FieldKind::Scalar => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> AdminSettings {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn accepts_consistent_settings() {
        let s = parse(json!({
            "models": [
                { "name": "User", "displayFields": ["email"], "fields": [
                    { "name": "id", "type": "Int" },
                    { "name": "email", "type": "String" },
                    { "name": "role", "kind": "enum", "type": "Role" }
                ]},
                { "name": "Post", "fields": [
                    { "name": "id", "type": "Int" },
                    { "name": "authorId", "type": "Int" },
                    { "name": "author", "kind": "relation", "type": "User",
                      "relation": { "fromFields": ["authorId"], "references": ["id"], "previewFields": ["email"] } }
                ]}
            ],
            "enums": [{ "name": "Role", "fields": ["ADMIN", "USER"] }]
        }));
        validate(&s).unwrap();
    }

    #[test]
    fn rejects_missing_id_field() {
        let s = parse(json!({ "models": [{ "name": "User", "fields": [{ "name": "email", "type": "String" }] }] }));
        assert!(matches!(validate(&s), Err(ConfigError::InvalidIdField { .. })));
    }

    #[test]
    fn rejects_unknown_relation_target() {
        let s = parse(json!({ "models": [{ "name": "Post", "fields": [
            { "name": "id", "type": "Int" },
            { "name": "author", "kind": "relation", "type": "User" }
        ]}]}));
        assert!(matches!(
            validate(&s),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_models() {
        let s = parse(json!({ "models": [
            { "name": "User", "fields": [{ "name": "id", "type": "Int" }] },
            { "name": "User", "fields": [{ "name": "id", "type": "Int" }] }
        ]}));
        assert!(matches!(validate(&s), Err(ConfigError::Duplicate { kind: "model", .. })));
    }
}
