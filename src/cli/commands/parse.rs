use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::{utils::output_value, OutputFormat};
use crate::search::{parse_search_query, Search, SearchCondition, SearchOptions};

pub fn handle(query: &str, sql: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let conditions = parse_search_query(query);

    match output_format {
        OutputFormat::Json => {
            let mut out = json!({ "query": query, "conditions": conditions });
            if sql {
                out["sql"] = render_sql(query)?;
            }
            output_value(&output_format, &out)?;
        }
        OutputFormat::Text => {
            if conditions.is_empty() {
                println!("(no conditions)");
            }
            for condition in &conditions {
                println!("{}", describe(condition));
            }
            if sql {
                let rendered = render_sql(query)?;
                println!();
                println!("{}", rendered["query"].as_str().unwrap_or_default());
                println!("params: {}", rendered["params"]);
            }
        }
    }
    Ok(())
}

/// SQL as the API would run it, for a placeholder admin
fn render_sql(query: &str) -> anyhow::Result<Value> {
    let mut search = Search::new(SearchOptions::for_admin(Uuid::nil()));
    search.query(query);
    let sql = search.to_sql()?;
    Ok(json!({ "query": sql.query, "params": sql.params }))
}

fn describe(condition: &SearchCondition) -> String {
    match condition {
        SearchCondition::Field { key, op, value } => format!("{} {:?} {}", key, op, value),
        SearchCondition::Status { status } => format!("status = {}", status),
        SearchCondition::Id { id } => format!("id = {}", id),
        SearchCondition::FullText { text } => format!("anywhere contains {:?}", text),
        SearchCondition::AnyOf { groups } => {
            let parts: Vec<String> = groups
                .iter()
                .map(|g| g.iter().map(describe).collect::<Vec<_>>().join(" AND "))
                .collect();
            format!("any of ({})", parts.join(") OR ("))
        }
    }
}
