use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data_value) = data {
                response["data"] = data_value;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print an API value: pretty JSON, or `key: value` lines for text output
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print_text(value, 0),
    }
    Ok(())
}

fn print_text(value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if v.is_object() || v.is_array() {
                    println!("{}{}:", indent, k);
                    print_text(v, depth + 1);
                } else {
                    println!("{}{}: {}", indent, k, scalar(v));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if item.is_object() || item.is_array() {
                    println!("{}-", indent);
                    print_text(item, depth + 1);
                } else {
                    println!("{}- {}", indent, scalar(item));
                }
            }
        }
        other => println!("{}{}", indent, scalar(other)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// One line per associate: id, status, matricula and name
pub fn associate_line(item: &Value) -> String {
    let attributes = &item["attributes"];
    let name = ["nome", "nome_completo", "name"]
        .iter()
        .find_map(|k| attributes.get(*k).and_then(Value::as_str))
        .unwrap_or("-");
    format!(
        "{}  {:<8}  {:>8}  {}",
        item["id"].as_str().unwrap_or("-"),
        item["status"].as_str().unwrap_or("-"),
        attributes.get("matricula").map(scalar).unwrap_or_else(|| "-".to_string()),
        name
    )
}
