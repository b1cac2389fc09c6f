use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::{client::ApiClient, utils::output_success, OutputFormat};
use crate::forms::{validate_definition, FormError};
use crate::services::form_service::FormInput;

#[derive(Subcommand)]
pub enum FormCommands {
    #[command(about = "Create a form from a YAML definition")]
    Import {
        #[arg(help = "YAML file with name, description and fields")]
        file: PathBuf,
        #[arg(long, help = "Also issue a public link for the new form")]
        link: bool,
        #[arg(long, help = "Link lifetime in hours")]
        ttl_hours: Option<i64>,
    },
}

pub async fn handle(cmd: FormCommands, api: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        FormCommands::Import { file, link, ttl_hours } => {
            let input = read_form_file(&file)?;
            let name = input.name.clone();
            let body = json!({
                "name": input.name,
                "description": input.description,
                "fields": input.fields,
            });
            let form = api.post("/api/forms", Some(body)).await?;
            let form_id = form["id"].as_str().unwrap_or_default().to_string();

            let mut data = json!({ "form": form });
            if link {
                let issued = api
                    .post(&format!("/api/forms/{}/links", form_id), Some(json!({ "ttl_hours": ttl_hours })))
                    .await?;
                if matches!(output_format, OutputFormat::Text) {
                    println!("Link: {}", issued["url"].as_str().unwrap_or("-"));
                }
                data["link"] = issued;
            }
            output_success(&output_format, &format!("Imported form '{}' ({})", name, form_id), Some(data))
        }
    }
}

/// Parses and checks locally so bad files fail before any request.
fn read_form_file(path: &PathBuf) -> anyhow::Result<FormInput> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse_form_yaml(&content)
}

fn parse_form_yaml(content: &str) -> anyhow::Result<FormInput> {
    let input: FormInput = serde_yaml::from_str(content).context("invalid form YAML")?;
    if let Err(err) = validate_definition(&input.fields) {
        let errors = match err {
            FormError::InvalidDefinition(errors) | FormError::InvalidSubmission(errors) => errors,
        };
        let mut details: Vec<String> = errors.into_iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        details.sort();
        anyhow::bail!("invalid form definition: {}", details.join("; "));
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldKind;

    #[test]
    fn yaml_forms_parse_and_validate() {
        let input = parse_form_yaml(
            r#"
name: Admissão
description: Dados iniciais
fields:
  - key: nome
    label: Nome completo
    kind: text
    required: true
  - key: turno
    label: Turno
    kind: select
    options: [manhã, tarde, noite]
"#,
        )
        .unwrap();
        assert_eq!(input.fields.len(), 2);
        assert_eq!(input.fields[1].kind, FieldKind::Select);
        assert!(!input.fields[1].required);
    }

    #[test]
    fn yaml_forms_report_definition_errors() {
        let err = parse_form_yaml(
            r#"
name: Quebrado
fields:
  - key: turno
    label: Turno
    kind: select
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("turno"));
    }
}
