//! Settings regeneration: introspect the PostgreSQL catalog into default settings,
//! then merge with the existing document so user preferences survive.

use crate::case::{to_camel_case, to_pascal_case};
use crate::error::AppError;
use crate::settings::{AdminEnum, AdminField, AdminModel, AdminSettings, FieldKind, RelationSettings};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One row of `information_schema.columns`.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CatalogColumn {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub has_default: bool,
}

/// Single-column foreign key: `table.column -> foreign_table.foreign_column`.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CatalogForeignKey {
    pub constraint_name: String,
    pub table_name: String,
    pub column_name: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub columns: Vec<CatalogColumn>,
    /// (table, column) pairs that form primary keys.
    pub primary_keys: Vec<(String, String)>,
    /// (table, column) pairs with a single-column unique constraint.
    pub unique_columns: Vec<(String, String)>,
    pub foreign_keys: Vec<CatalogForeignKey>,
    /// enum type name -> labels in sort order.
    pub enums: BTreeMap<String, Vec<String>>,
}

const COLUMNS_SQL: &str = r#"
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       c.data_type::text AS data_type,
       c.udt_name::text AS udt_name,
       (c.is_nullable = 'YES') AS is_nullable,
       (c.column_default IS NOT NULL OR c.is_identity = 'YES') AS has_default
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position
"#;

const KEYS_SQL: &str = r#"
SELECT kcu.table_name::text, kcu.column_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
WHERE tc.table_schema = $1 AND tc.constraint_type = $2
  AND (SELECT COUNT(*) FROM information_schema.key_column_usage k2
       WHERE k2.constraint_name = tc.constraint_name AND k2.table_schema = tc.table_schema) = 1
ORDER BY kcu.table_name, kcu.ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
SELECT kcu.table_name::text, kcu.column_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY'
ORDER BY kcu.table_name, kcu.ordinal_position
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT tc.constraint_name::text AS constraint_name,
       kcu.table_name::text AS table_name,
       kcu.column_name::text AS column_name,
       ccu.table_name::text AS foreign_table,
       ccu.column_name::text AS foreign_column
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
WHERE tc.table_schema = $1 AND tc.constraint_type = 'FOREIGN KEY'
ORDER BY kcu.table_name, tc.constraint_name
"#;

const ENUMS_SQL: &str = r#"
SELECT t.typname::text, e.enumlabel::text
FROM pg_type t
JOIN pg_enum e ON e.enumtypid = t.oid
JOIN pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
ORDER BY t.typname, e.enumsortorder
"#;

/// Read tables, keys and enum types of `schema` from the catalog.
pub async fn read_catalog(pool: &PgPool, schema: &str) -> Result<Catalog, AppError> {
    tracing::debug!(schema = %schema, "reading catalog");
    let columns = sqlx::query_as::<_, CatalogColumn>(COLUMNS_SQL)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    let primary_keys = sqlx::query_as::<_, (String, String)>(PRIMARY_KEYS_SQL)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    let unique_columns = sqlx::query_as::<_, (String, String)>(KEYS_SQL)
        .bind(schema)
        .bind("UNIQUE")
        .fetch_all(pool)
        .await?;
    let foreign_keys = sqlx::query_as::<_, CatalogForeignKey>(FOREIGN_KEYS_SQL)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    let enum_rows = sqlx::query_as::<_, (String, String)>(ENUMS_SQL)
        .bind(schema)
        .fetch_all(pool)
        .await?;
    let mut enums: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, label) in enum_rows {
        enums.entry(name).or_default().push(label);
    }
    Ok(Catalog {
        columns,
        primary_keys,
        unique_columns,
        foreign_keys,
        enums,
    })
}

/// Introspect `schema` and build default settings.
pub async fn introspect(pool: &PgPool, schema: &str) -> Result<AdminSettings, AppError> {
    let catalog = read_catalog(pool, schema).await?;
    Ok(build_settings(&catalog))
}

fn scalar_type_name(data_type: &str, udt_name: &str) -> &'static str {
    match udt_name.trim_start_matches('_') {
        "int2" | "int4" => "Int",
        "int8" => "BigInt",
        "float4" | "float8" => "Float",
        "numeric" | "money" => "Decimal",
        "bool" => "Boolean",
        "timestamp" | "timestamptz" | "date" | "time" | "timetz" => "DateTime",
        "json" | "jsonb" => "Json",
        "bytea" => "Bytes",
        _ if data_type == "USER-DEFINED" => "Enum",
        _ => "String",
    }
}

fn native_type_for(udt_name: &str) -> Option<String> {
    match udt_name.trim_start_matches('_') {
        "uuid" | "date" | "timestamptz" | "time" | "timetz" | "float4" | "int2" => {
            Some(udt_name.trim_start_matches('_').to_string())
        }
        _ => None,
    }
}

/// Build default settings from a catalog snapshot.
pub fn build_settings(catalog: &Catalog) -> AdminSettings {
    let pk: HashSet<(&str, &str)> = catalog
        .primary_keys
        .iter()
        .map(|(t, c)| (t.as_str(), c.as_str()))
        .collect();
    let unique: HashSet<(&str, &str)> = catalog
        .unique_columns
        .iter()
        .map(|(t, c)| (t.as_str(), c.as_str()))
        .collect();

    let mut by_table: BTreeMap<&str, Vec<&CatalogColumn>> = BTreeMap::new();
    for c in &catalog.columns {
        if c.table_name.starts_with('_') {
            continue;
        }
        by_table.entry(c.table_name.as_str()).or_default().push(c);
    }
    let mut models: Vec<AdminModel> = Vec::with_capacity(by_table.len());
    for (&table, cols) in &by_table {
        let mut fields = Vec::with_capacity(cols.len());
        let mut id_field = None;
        for c in cols {
            let is_id = pk.contains(&(table, c.column_name.as_str()));
            let type_name = scalar_type_name(&c.data_type, &c.udt_name);
            let mut f = if type_name == "Enum" {
                let mut f = AdminField::scalar(&to_camel_case(&c.column_name), c.udt_name.trim_start_matches('_'));
                f.kind = FieldKind::Enum;
                f
            } else {
                let mut f = AdminField::scalar(&to_camel_case(&c.column_name), type_name);
                f.native_type = native_type_for(&c.udt_name);
                f
            };
            if f.name != c.column_name {
                f.column = Some(c.column_name.clone());
            }
            f.is_list = c.data_type == "ARRAY";
            f.is_id = is_id;
            f.is_unique = is_id || unique.contains(&(table, c.column_name.as_str()));
            f.is_required = !c.is_nullable && !c.has_default;
            f.has_default_value = c.has_default;
            if f.name == "updatedAt" && type_name == "DateTime" {
                f.is_updated_at = true;
            }
            if is_id && id_field.is_none() {
                id_field = Some(f.name.clone());
            }
            fields.push(f);
        }
        let id_field = id_field
            .or_else(|| fields.first().map(|f| f.name.clone()))
            .unwrap_or_else(|| "id".into());
        let name = model_name(table);
        models.push(AdminModel {
            table_name: (name != table).then(|| table.to_string()),
            name,
            display_name: None,
            schema: None,
            id_field,
            display_fields: Vec::new(),
            can_create: true,
            can_update: true,
            can_delete: true,
            fields,
        });
    }

    for fk in &catalog.foreign_keys {
        if fk.table_name.starts_with('_') || fk.foreign_table.starts_with('_') {
            continue;
        }
        let from_model = model_name(&fk.table_name);
        let to_model = model_name(&fk.foreign_table);
        let fk_field = to_camel_case(&fk.column_name);
        let ref_field = to_camel_case(&fk.foreign_column);
        let is_unique_fk = unique.contains(&(fk.table_name.as_str(), fk.column_name.as_str()));

        let forward_name = relation_field_name(&fk_field, &to_model);
        let Some(from) = models.iter_mut().find(|m| m.name == from_model) else { continue };
        let required = from.field(&fk_field).map(|f| f.is_required).unwrap_or(false);
        let mut forward = AdminField::scalar(&unique_name(from, &forward_name), &to_model);
        forward.kind = FieldKind::Relation;
        forward.is_required = required;
        forward.relation = Some(RelationSettings {
            name: Some(fk.constraint_name.clone()),
            from_fields: vec![fk_field.clone()],
            references: vec![ref_field],
            ..Default::default()
        });
        from.fields.push(forward);

        let Some(to) = models.iter_mut().find(|m| m.name == to_model) else { continue };
        let back_base = if is_unique_fk {
            lower_first(&from_model)
        } else {
            format!("{}s", lower_first(&from_model))
        };
        let mut back = AdminField::scalar(&unique_name(to, &back_base), &from_model);
        back.kind = FieldKind::Relation;
        back.is_list = !is_unique_fk;
        back.relation = Some(RelationSettings {
            name: Some(fk.constraint_name.clone()),
            ..Default::default()
        });
        to.fields.push(back);
    }

    let enums = catalog
        .enums
        .iter()
        .map(|(name, labels)| AdminEnum {
            name: name.clone(),
            fields: labels.clone(),
        })
        .collect();

    AdminSettings { models, enums }
}

/// "blog_posts" -> "BlogPost"
fn model_name(table: &str) -> String {
    let singular = if let Some(stem) = table.strip_suffix("ies") {
        format!("{}y", stem)
    } else if table.ends_with('s') && !table.ends_with("ss") && !table.ends_with("us") {
        table[..table.len() - 1].to_string()
    } else {
        table.to_string()
    };
    to_pascal_case(&singular)
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "authorId" referencing User -> "author"; otherwise the camelCased target name.
fn relation_field_name(fk_field: &str, target_model: &str) -> String {
    match fk_field.strip_suffix("Id") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => lower_first(target_model),
    }
}

fn unique_name(model: &AdminModel, base: &str) -> String {
    if model.field(base).is_none() {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| model.field(candidate).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// Structure from `generated`, preferences from `existing` for models and fields that still exist.
pub fn merge_settings(existing: &AdminSettings, generated: &AdminSettings) -> AdminSettings {
    let existing_models: HashMap<&str, &AdminModel> =
        existing.models.iter().map(|m| (m.name.as_str(), m)).collect();

    let models = generated
        .models
        .iter()
        .map(|gen| {
            let Some(old) = existing_models.get(gen.name.as_str()) else {
                return gen.clone();
            };
            let fields: Vec<AdminField> = gen
                .fields
                .iter()
                .map(|gf| match old.field(&gf.name) {
                    Some(of) => merge_field(of, gf),
                    None => gf.clone(),
                })
                .collect();
            for dropped in old.fields.iter().filter(|of| gen.field(&of.name).is_none()) {
                tracing::warn!(model = %gen.name, field = %dropped.name, "field no longer in schema, dropping");
            }
            let display_fields = old
                .display_fields
                .iter()
                .filter(|d| gen.field(d).is_some())
                .cloned()
                .collect();
            AdminModel {
                display_name: old.display_name.clone(),
                display_fields,
                can_create: old.can_create,
                can_update: old.can_update,
                can_delete: old.can_delete,
                fields,
                ..gen.clone()
            }
        })
        .collect();

    for dropped in existing.models.iter().filter(|m| generated.model(&m.name).is_none()) {
        tracing::warn!(model = %dropped.name, "model no longer in schema, dropping");
    }

    AdminSettings {
        models,
        enums: generated.enums.clone(),
    }
}

fn merge_field(old: &AdminField, generated: &AdminField) -> AdminField {
    let relation = match (&generated.relation, &old.relation) {
        (Some(g), Some(o)) => Some(RelationSettings {
            display_mode: o.display_mode,
            edit_mode: o.edit_mode,
            actions: o.actions.clone(),
            preview_fields: o.preview_fields.clone(),
            join_table: o.join_table.clone().or_else(|| g.join_table.clone()),
            ..g.clone()
        }),
        (g, _) => g.clone(),
    };
    AdminField {
        title: old.title.clone(),
        is_read_only: old.is_read_only,
        visibility: old.visibility.clone(),
        validation: old.validation.clone(),
        relation,
        ..generated.clone()
    }
}
