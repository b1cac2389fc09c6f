use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::{
    client::ApiClient,
    utils::{associate_line, output_value},
    OutputFormat,
};

#[derive(Subcommand)]
pub enum AssociateCommands {
    #[command(about = "Search associates with free text")]
    Search {
        #[arg(help = "Search text, e.g. \"cidade Recife, cargo analista\"")]
        query: Option<String>,
        #[arg(long, help = "active, inactive or all")]
        status: Option<String>,
        #[arg(long, help = "e.g. \"nome asc\"")]
        order: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },

    #[command(about = "Show one associate")]
    Get {
        id: Uuid,
    },

    #[command(about = "Reactivate an associate")]
    Activate {
        id: Uuid,
    },

    #[command(about = "Deactivate an associate")]
    Deactivate {
        id: Uuid,
        #[arg(long, help = "Why the associate is leaving")]
        reason: Option<String>,
    },
}

pub async fn handle(cmd: AssociateCommands, api: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AssociateCommands::Search { query, status, order, limit, offset } => {
            let params: Vec<(&str, String)> = [
                ("q", query),
                ("status", status),
                ("order", order),
                ("limit", limit.map(|l| l.to_string())),
                ("offset", offset.map(|o| o.to_string())),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

            let page = api.get("/api/associates", &params).await?;
            match output_format {
                OutputFormat::Json => output_value(&output_format, &page)?,
                OutputFormat::Text => print_page(&page),
            }
            Ok(())
        }
        AssociateCommands::Get { id } => {
            let associate = api.get(&format!("/api/associates/{}", id), &[("meta", "true".to_string())]).await?;
            output_value(&output_format, &associate)
        }
        AssociateCommands::Activate { id } => {
            let associate = api.post(&format!("/api/associates/{}/activate", id), None).await?;
            report_status(&output_format, &associate)
        }
        AssociateCommands::Deactivate { id, reason } => {
            let associate = api
                .post(&format!("/api/associates/{}/deactivate", id), Some(json!({ "reason": reason })))
                .await?;
            report_status(&output_format, &associate)
        }
    }
}

fn print_page(page: &Value) {
    let items = page["items"].as_array().cloned().unwrap_or_default();
    for item in &items {
        println!("{}", associate_line(item));
    }
    println!(
        "{} of {} (offset {})",
        items.len(),
        page["total"].as_i64().unwrap_or(0),
        page["offset"].as_i64().unwrap_or(0)
    );
}

fn report_status(output_format: &OutputFormat, associate: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_value(output_format, associate),
        OutputFormat::Text => {
            println!("✓ {}", associate_line(associate));
            Ok(())
        }
    }
}
