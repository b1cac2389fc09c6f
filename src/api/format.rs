use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::database::models::Associate;

pub const ASSOCIATE_TYPE: &str = "associates";

/// Options that control which metadata categories are included in the API response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataOptions {
    pub include_system: bool,
    pub include_lifecycle: bool,
    /// Specific fields to include (dot notation: "system.created_at", "lifecycle.inactivated_at")
    pub specific_fields: Option<Vec<String>>,
}

impl MetadataOptions {
    pub fn all() -> Self {
        Self {
            include_system: true,
            include_lifecycle: true,
            specific_fields: None,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn should_include_any(&self) -> bool {
        self.include_system || self.include_lifecycle
    }
}

/// `meta=true`, `meta=system,lifecycle` or `meta=system.created_at`
pub fn metadata_options_from_query(meta_param: Option<&str>) -> MetadataOptions {
    match meta_param {
        None => MetadataOptions::none(),
        Some("true") => MetadataOptions::all(),
        Some("false") | Some("") => MetadataOptions::none(),
        Some(param_value) => {
            let mut opts = MetadataOptions::default();
            let mut specific = Vec::new();
            for part in param_value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
                match part {
                    "system" => opts.include_system = true,
                    "lifecycle" => opts.include_lifecycle = true,
                    other if other.contains('.') => {
                        // A dotted field implies its category
                        match other.split('.').next() {
                            Some("system") => opts.include_system = true,
                            Some("lifecycle") => opts.include_lifecycle = true,
                            _ => {}
                        }
                        specific.push(other.to_string());
                    }
                    _ => {}
                }
            }
            if !specific.is_empty() {
                opts.specific_fields = Some(specific);
            }
            opts
        }
    }
}

/// Convert an associate into the public wire format
/// { id, type, status, attributes, attachments, meta, links }
pub fn associate_to_api_value(associate: &Associate, options: &MetadataOptions) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(associate.id.to_string()));
    obj.insert("type".into(), Value::String(ASSOCIATE_TYPE.to_string()));
    obj.insert("status".into(), Value::String(associate.lifecycle().as_str().to_string()));
    obj.insert("attributes".into(), attributes(&associate.data));
    obj.insert("attachments".into(), associate.attachments.clone());

    if options.should_include_any() {
        obj.insert("meta".into(), build_meta(associate, options));
    }

    obj.insert(
        "links".into(),
        json!({ "self": format!("/api/{}/{}", ASSOCIATE_TYPE, associate.id) }),
    );

    Value::Object(obj)
}

pub fn associates_to_api_values(associates: &[Associate], options: &MetadataOptions) -> Vec<Value> {
    associates.iter().map(|a| associate_to_api_value(a, options)).collect()
}

fn attributes(data: &Value) -> Value {
    match data {
        Value::Object(_) => data.clone(),
        _ => Value::Object(Map::new()),
    }
}

fn build_meta(associate: &Associate, options: &MetadataOptions) -> Value {
    let mut m = Map::new();

    if options.include_system {
        m.insert(
            "system".into(),
            json!({
                "created_at": associate.created_at.to_rfc3339(),
                "updated_at": associate.updated_at.to_rfc3339(),
                "deleted_at": associate.deleted_at.map(|dt| dt.to_rfc3339()),
                "form_id": associate.form_id,
            }),
        );
    }

    if options.include_lifecycle {
        m.insert(
            "lifecycle".into(),
            json!({
                "inactivated_at": associate.inactivated_at.map(|dt| dt.to_rfc3339()),
                "inactivation_reason": associate.inactivation_reason,
            }),
        );
    }

    let meta_value = Value::Object(m);
    match &options.specific_fields {
        Some(fields) => filter_metadata_fields(meta_value, fields),
        None => meta_value,
    }
}

fn filter_metadata_fields(metadata: Value, fields: &[String]) -> Value {
    let mut filtered = json!({});
    for field in fields {
        if let Some((category, field_name)) = field.split_once('.') {
            if let Some(field_value) = metadata.get(category).and_then(|c| c.get(field_name)) {
                if filtered.get(category).is_none() {
                    filtered[category] = json!({});
                }
                filtered[category][field_name] = field_value.clone();
            }
        }
    }
    filtered
}
