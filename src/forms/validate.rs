use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::field::{Attachment, FieldKind, FormField};
use crate::search::parser::is_identifier;

pub type FieldErrors = HashMap<String, String>;

/// Keys that collide with associate columns or search keywords.
pub const RESERVED_KEYS: &[&str] = &["id", "status", "situacao", "admin_id", "created_at", "updated_at", "deleted_at"];

const MAX_TEXT_LENGTH: usize = 2000;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Invalid form definition")]
    InvalidDefinition(FieldErrors),

    #[error("Submission failed validation")]
    InvalidSubmission(FieldErrors),
}

/// Check a whole form: at least one field, unique identifier keys.
pub fn validate_definition(fields: &[FormField]) -> Result<(), FormError> {
    let mut errors = FieldErrors::new();
    if fields.is_empty() {
        errors.insert("fields".to_string(), "A form needs at least one field".to_string());
    }

    let mut seen = HashSet::new();
    for field in fields {
        if let Err(msg) = validate_field_definition(field) {
            errors.insert(field.key.clone(), msg);
        } else if !seen.insert(field.key.as_str()) {
            errors.insert(field.key.clone(), "Duplicate field key".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(FormError::InvalidDefinition(errors))
    }
}

pub fn validate_field_definition(field: &FormField) -> Result<(), String> {
    if !is_identifier(&field.key) {
        return Err("Key must use lowercase letters, digits and underscore".to_string());
    }
    if RESERVED_KEYS.contains(&field.key.as_str()) {
        return Err(format!("Key '{}' is reserved", field.key));
    }
    if field.label.trim().is_empty() {
        return Err("Label cannot be empty".to_string());
    }
    if field.kind == FieldKind::Select && field.options.is_empty() {
        return Err("Select fields need at least one option".to_string());
    }
    Ok(())
}

/// Validate submitted answers against the form and return the normalised
/// document. Keys the form does not define are carried through untouched.
pub fn validate_submission(fields: &[FormField], data: &Value) -> Result<Map<String, Value>, FormError> {
    let Value::Object(input) = data else {
        let mut errors = FieldErrors::new();
        errors.insert("data".to_string(), "Submission must be a JSON object".to_string());
        return Err(FormError::InvalidSubmission(errors));
    };

    let mut output = input.clone();
    let mut errors = FieldErrors::new();

    for field in fields {
        match input.get(&field.key) {
            Some(value) if !is_blank(value) => match validate_value(field, value) {
                Ok(normalized) => {
                    output.insert(field.key.clone(), normalized);
                }
                Err(msg) => {
                    errors.insert(field.key.clone(), msg);
                }
            },
            _ if field.required => {
                errors.insert(field.key.clone(), "This field is required".to_string());
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(FormError::InvalidSubmission(errors))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Validate and normalise a single answer.
pub fn validate_value(field: &FormField, value: &Value) -> Result<Value, String> {
    match field.kind {
        FieldKind::Text => {
            let text = scalar_string(value).ok_or("Expected text")?;
            if text.chars().count() > MAX_TEXT_LENGTH {
                return Err(format!("Text longer than {} characters", MAX_TEXT_LENGTH));
            }
            Ok(Value::String(text))
        }
        FieldKind::Number => match value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => parse_localized_number(s)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a number", s)),
            _ => Err("Expected a number".to_string()),
        },
        FieldKind::Date => {
            let text = value.as_str().ok_or("Expected a date")?.trim();
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD or DD/MM/YYYY)", text))
        }
        FieldKind::Email => {
            let text = value.as_str().ok_or("Expected an email address")?.trim().to_lowercase();
            validate_email_format(&text)?;
            Ok(Value::String(text))
        }
        FieldKind::Cpf => {
            let digits = scalar_string(value).map(|s| only_digits(&s)).ok_or("Expected a CPF")?;
            if !is_valid_cpf(&digits) {
                return Err("Invalid CPF".to_string());
            }
            Ok(Value::String(digits))
        }
        FieldKind::Phone => {
            let digits = scalar_string(value).map(|s| only_digits(&s)).ok_or("Expected a phone number")?;
            if !(8..=13).contains(&digits.len()) {
                return Err("Phone numbers have between 8 and 13 digits".to_string());
            }
            Ok(Value::String(digits))
        }
        FieldKind::Select => {
            let text = scalar_string(value).ok_or("Expected one of the options")?;
            if !field.options.iter().any(|o| o == &text) {
                return Err(format!("'{}' is not one of: {}", text, field.options.join(", ")));
            }
            Ok(Value::String(text))
        }
        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "sim" | "s" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "nao" | "não" | "n" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not yes/no", s)),
            },
            _ => Err("Expected yes/no".to_string()),
        },
        FieldKind::File => {
            let attachment = parse_attachment(value)?;
            serde_json::to_value(attachment).map_err(|e| e.to_string())
        }
    }
}

/// Accepts the attachment-metadata array stored alongside associate data.
pub fn validate_attachments(value: &Value) -> Result<Vec<Attachment>, String> {
    match value {
        Value::Null => Ok(vec![]),
        Value::Array(items) => items.iter().map(parse_attachment).collect(),
        _ => Err("Attachments must be an array".to_string()),
    }
}

fn parse_attachment(value: &Value) -> Result<Attachment, String> {
    let attachment = match value {
        Value::String(url) => {
            let parsed = url::Url::parse(url).map_err(|_| format!("'{}' is not a URL", url))?;
            let name = parsed
                .path_segments()
                .and_then(|segments| segments.last())
                .filter(|s| !s.is_empty())
                .unwrap_or("attachment")
                .to_string();
            Attachment { name, url: url.clone(), content_type: None, size: None }
        }
        Value::Object(_) => serde_json::from_value::<Attachment>(value.clone())
            .map_err(|e| format!("Invalid attachment: {}", e))?,
        _ => return Err("Expected an attachment object or URL".to_string()),
    };

    if attachment.name.trim().is_empty() {
        return Err("Attachment name cannot be empty".to_string());
    }
    match url::Url::parse(&attachment.url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(attachment),
        _ => Err(format!("Attachment URL must be http(s): {}", attachment.url)),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `1.234,56` and `1234.56` both read as 1234.56.
fn parse_localized_number(text: &str) -> Option<Number> {
    let text = text.trim();
    let normalized = if text.contains(',') {
        text.replace('.', "").replace(',', ".")
    } else {
        text.to_string()
    };
    crate::search::parser::parse_number(&normalized)
}

pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }
    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') || email.contains(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Brazilian taxpayer number: 11 digits, not all equal, two mod-11 check digits.
pub fn is_valid_cpf(digits: &str) -> bool {
    let d: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if d.len() != 11 || digits.len() != 11 || d.iter().all(|&x| x == d[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = d[..len].iter().enumerate().map(|(i, &x)| x * (len as u32 + 1 - i as u32)).sum();
        (sum * 10) % 11 % 10
    };

    check(9) == d[9] && check(10) == d[10]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(key: &str, kind: FieldKind, required: bool) -> FormField {
        FormField {
            key: key.to_string(),
            label: key.to_string(),
            kind,
            required,
            options: vec![],
            description: None,
        }
    }

    #[test]
    fn cpf_check_digits() {
        assert!(is_valid_cpf("52998224725"));
        assert!(is_valid_cpf("11144477735"));
        assert!(!is_valid_cpf("52998224726"));
        assert!(!is_valid_cpf("11111111111"));
        assert!(!is_valid_cpf("123"));
    }

    #[test]
    fn definition_rules() {
        let mut select = field("setor", FieldKind::Select, true);
        assert!(validate_field_definition(&select).is_err());
        select.options = vec!["RH".to_string()];
        assert!(validate_field_definition(&select).is_ok());

        assert!(validate_field_definition(&field("status", FieldKind::Text, false)).is_err());
        assert!(validate_field_definition(&field("Nome Completo", FieldKind::Text, false)).is_err());

        let dup = vec![field("nome", FieldKind::Text, true), field("nome", FieldKind::Text, false)];
        match validate_definition(&dup) {
            Err(FormError::InvalidDefinition(errors)) => assert!(errors.contains_key("nome")),
            other => panic!("expected duplicate error, got {:?}", other),
        }
        assert!(validate_definition(&[]).is_err());
    }

    #[test]
    fn submission_normalizes_values() {
        let mut setor = field("setor", FieldKind::Select, false);
        setor.options = vec!["RH".to_string(), "TI".to_string()];
        let fields = vec![
            field("nome", FieldKind::Text, true),
            field("cpf", FieldKind::Cpf, true),
            field("admissao", FieldKind::Date, false),
            field("salario", FieldKind::Number, false),
            field("email", FieldKind::Email, false),
            field("celular", FieldKind::Phone, false),
            field("ativo_sindicato", FieldKind::Boolean, false),
            setor,
        ];

        let out = validate_submission(
            &fields,
            &json!({
                "nome": " Ana ",
                "cpf": "529.982.247-25",
                "admissao": "05/01/2020",
                "salario": "3.500,50",
                "email": "Ana@Example.com",
                "celular": "(81) 99999-0000",
                "ativo_sindicato": "sim",
                "setor": "TI",
                "extra": 1
            }),
        )
        .unwrap();

        assert_eq!(out["nome"], json!("Ana"));
        assert_eq!(out["cpf"], json!("52998224725"));
        assert_eq!(out["admissao"], json!("2020-01-05"));
        assert_eq!(out["salario"], json!(3500.5));
        assert_eq!(out["email"], json!("ana@example.com"));
        assert_eq!(out["celular"], json!("81999990000"));
        assert_eq!(out["ativo_sindicato"], json!(true));
        assert_eq!(out["extra"], json!(1));
    }

    #[test]
    fn submission_collects_every_error() {
        let fields = vec![
            field("nome", FieldKind::Text, true),
            field("cpf", FieldKind::Cpf, true),
            field("admissao", FieldKind::Date, false),
        ];
        match validate_submission(&fields, &json!({ "nome": "  ", "cpf": "123", "admissao": "ontem" })) {
            Err(FormError::InvalidSubmission(errors)) => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors["nome"], "This field is required");
            }
            other => panic!("expected errors, got {:?}", other),
        }
        assert!(validate_submission(&fields, &json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn attachments_accept_objects_and_urls() {
        let list = validate_attachments(&json!([
            "https://files.example.com/docs/rg.pdf",
            { "name": "ctps.png", "url": "https://files.example.com/ctps.png", "content_type": "image/png", "size": 1024 }
        ]))
        .unwrap();
        assert_eq!(list[0].name, "rg.pdf");
        assert_eq!(list[1].size, Some(1024));

        assert!(validate_attachments(&json!(["ftp://x/y"])).is_err());
        assert!(validate_attachments(&json!({ "name": "x" })).is_err());
    }

    #[test]
    fn email_format() {
        assert!(validate_email_format("rh@empresa.com.br").is_ok());
        assert!(validate_email_format("rh@empresa").is_err());
        assert!(validate_email_format("@empresa.com").is_err());
        assert!(validate_email_format("a b@empresa.com").is_err());
    }
}
