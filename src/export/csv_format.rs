//! Section-headered CSV: each data type becomes a `# <type>` marker row, a
//! header row of flattened field paths, then one row per record.

use serde::Serialize;
use serde_json::{Map, Value};

use super::ExportBundle;
use crate::error::ExportError;

pub(super) fn to_csv(bundle: &ExportBundle) -> Result<Vec<u8>, ExportError> {
    let mut sections: Vec<Vec<u8>> = Vec::new();

    if let Some(rows) = &bundle.performance {
        sections.push(section("performance", rows)?);
    }
    if let Some(rows) = &bundle.resources {
        sections.push(section("resources", rows)?);
    }
    if let Some(rows) = &bundle.network {
        sections.push(section("network", rows)?);
    }
    if let Some(rows) = &bundle.behavior {
        sections.push(section("behavior", rows)?);
    }
    if let Some(rows) = &bundle.errors {
        sections.push(section("errors", rows)?);
    }
    if let Some(rows) = &bundle.snapshots {
        sections.push(section("snapshots", rows)?);
    }

    Ok(sections.join(&b"\n"[..]))
}

fn section<T: Serialize>(name: &str, rows: &[T]) -> Result<Vec<u8>, ExportError> {
    let mut flattened = Vec::with_capacity(rows.len());
    for row in rows {
        let mut flat = Map::new();
        flatten("", serde_json::to_value(row)?, &mut flat);
        flattened.push(flat);
    }

    // Union of keys in first-seen order.
    let mut header: Vec<String> = Vec::new();
    for row in &flattened {
        for key in row.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    writer.write_record([format!("# {}", name)])?;
    if !header.is_empty() {
        writer.write_record(&header)?;
    }
    for row in &flattened {
        writer.write_record(header.iter().map(|key| cell(row.get(key))))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))
}

/// Nested objects become dotted paths; arrays stay as JSON text.
fn flatten(prefix: &str, value: Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, value, out);
            }
        }
        other => {
            let key = if prefix.is_empty() { "value".to_string() } else { prefix.to_string() };
            out.insert(key, other);
        }
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattens_nested_objects() {
        let mut out = Map::new();
        flatten("", json!({"a": 1, "b": {"c": "x", "d": [1, 2]}}), &mut out);
        assert_eq!(out.get("a"), Some(&json!(1)));
        assert_eq!(out.get("b.c"), Some(&json!("x")));
        assert_eq!(cell(out.get("b.d")), "[1,2]");
        assert_eq!(cell(None), "");
    }
}
