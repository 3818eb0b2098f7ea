//! CSV export of read-visible scalar and enum fields.

use crate::error::AppError;
use crate::settings::{ColumnInfo, ResolvedEntity, ScalarType};
use csv::Writer;
use serde_json::Value;

/// Exported columns, in settings order.
pub fn export_columns(entity: &ResolvedEntity) -> Vec<&ColumnInfo> {
    entity.columns.iter().filter(|c| c.visibility.read).collect()
}

fn cell_text(col: &ColumnInfo, v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(v) if col.scalar == ScalarType::Json || col.is_list => v.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Header row of field names, then one line per row.
pub fn export_csv(entity: &ResolvedEntity, rows: &[Value]) -> Result<String, AppError> {
    let columns = export_columns(entity);
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(|c| c.field.as_str()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell_text(c, row.get(&c.field))))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv export: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("csv export: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::blog;
    use serde_json::json;

    #[test]
    fn header_and_cells() {
        let s = blog();
        let post = s.entity("Post").unwrap();
        let rows = vec![
            json!({ "id": 1, "title": "Hello, \"world\"", "published": true, "views": 3,
                    "metadata": { "a": [1] }, "authorId": null, "updatedAt": "2024-01-02T03:04:05" }),
            json!({ "id": 2, "title": "x", "published": false, "views": 0, "metadata": "s" }),
        ];
        let out = export_csv(post, &rows).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "id,title,published,views,metadata,authorId,updatedAt");
        assert_eq!(
            lines[1],
            r#"1,"Hello, ""world""",true,3,"{""a"":[1]}",,2024-01-02T03:04:05"#
        );
        assert_eq!(lines[2], r#"2,x,false,0,"""s""",,"#);
    }
}
