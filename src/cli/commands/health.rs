use crate::cli::{client::ApiClient, utils::output_value, OutputFormat};

pub async fn handle(api: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let (status, body) = api.get_raw("/health").await?;
    match output_format {
        OutputFormat::Json => output_value(&output_format, &body)?,
        OutputFormat::Text => {
            let state = body["data"]["status"].as_str().unwrap_or("unknown");
            let database = body["data"]["database"].as_str().unwrap_or("unknown");
            println!("{} ({}), database: {}", state, status, database);
        }
    }
    if !status.is_success() {
        anyhow::bail!("API is degraded ({})", status);
    }
    Ok(())
}
