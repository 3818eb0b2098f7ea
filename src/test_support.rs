//! Shared fixtures for unit tests.

use crate::settings::{resolve, AdminSettings, ResolvedSettings};
use serde_json::json;

pub fn blog_settings() -> AdminSettings {
    serde_json::from_value(json!({
        "models": [
            { "name": "User", "tableName": "users", "displayFields": ["email"], "fields": [
                { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                { "name": "email", "type": "String", "isRequired": true, "isUnique": true,
                  "validation": { "format": "email" } },
                { "name": "name", "type": "String", "validation": { "maxLength": 5 } },
                { "name": "age", "type": "Int" },
                { "name": "role", "kind": "enum", "type": "Role", "hasDefaultValue": true },
                { "name": "posts", "kind": "relation", "type": "Post", "isList": true }
            ]},
            { "name": "Post", "displayFields": ["title"], "fields": [
                { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                { "name": "title", "type": "String", "isRequired": true },
                { "name": "published", "type": "Boolean", "hasDefaultValue": true },
                { "name": "views", "type": "Int", "hasDefaultValue": true },
                { "name": "metadata", "type": "Json" },
                { "name": "secret", "type": "String", "visibility": { "read": false, "create": false } },
                { "name": "authorId", "type": "Int", "column": "author_id" },
                { "name": "author", "kind": "relation", "type": "User",
                  "relation": { "fromFields": ["authorId"], "references": ["id"], "displayMode": "badge" } },
                { "name": "tags", "kind": "relation", "type": "Tag", "isList": true,
                  "relation": { "displayMode": "tags", "previewFields": ["label"] } },
                { "name": "updatedAt", "type": "DateTime", "column": "updated_at", "isUpdatedAt": true }
            ]},
            { "name": "Tag", "displayFields": ["label"], "fields": [
                { "name": "id", "type": "Int", "isId": true },
                { "name": "label", "type": "String", "isRequired": true },
                { "name": "posts", "kind": "relation", "type": "Post", "isList": true }
            ]},
            { "name": "Archive", "canCreate": false, "canUpdate": false, "canDelete": false, "fields": [
                { "name": "id", "type": "String", "nativeType": "uuid", "isId": true, "hasDefaultValue": true },
                { "name": "note", "type": "String" }
            ]}
        ],
        "enums": [{ "name": "Role", "fields": ["ADMIN", "USER"] }]
    }))
    .unwrap()
}

pub fn blog() -> ResolvedSettings {
    resolve(&blog_settings(), "public").unwrap()
}
