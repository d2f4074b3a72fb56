//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, PrefnetArgs};
use crate::error::Result;
use crate::run::{ModelId, RunSummary};
use crate::scorer::ScoredCandidate;

/// Result structure for recommendations.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResults {
    pub user_id: u64,
    pub model_id: ModelId,
    pub recommendations: Vec<ScoredCandidate>,
    pub duration_ms: u64,
}

/// Result structure for model listings.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub current_model_id: Option<ModelId>,
    pub models: Vec<RunSummary>,
}

/// Result structure for model cleanup.
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResult {
    pub models_removed: usize,
    pub models_remaining: usize,
}

/// Print `result` in the selected output format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &PrefnetArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &PrefnetArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().contains("RecommendationResults") => {
            output_recommendations_human(&value)
        }
        _ if std::any::type_name::<T>().contains("ModelList") => output_models_human(&value),
        _ => output_generic_human(&value),
    }
}

fn output_recommendations_human(value: &serde_json::Value) -> Result<()> {
    if let Some(items) = value.get("recommendations").and_then(|r| r.as_array()) {
        println!("Recommendations:");
        println!("════════════════");

        if items.is_empty() {
            println!("(no candidates)");
        }
        for (rank, item) in items.iter().enumerate() {
            let item_id = item.get("item_id").and_then(|i| i.as_u64()).unwrap_or_default();
            let score = item
                .get("predicted_score")
                .and_then(|s| s.as_f64())
                .unwrap_or_default();
            println!("{:>3}. item {item_id:<10} score {score:.4}", rank + 1);
        }

        if let Some(model_id) = value.get("model_id").and_then(|m| m.as_str()) {
            println!();
            println!("Model: {model_id}");
        }
    }
    Ok(())
}

fn output_models_human(value: &serde_json::Value) -> Result<()> {
    let current = value.get("current_model_id").and_then(|c| c.as_str());

    if let Some(models) = value.get("models").and_then(|m| m.as_array()) {
        println!("Models:");
        println!("═══════");

        if models.is_empty() {
            println!("(no models registered)");
        }
        for model in models {
            let id = model.get("model_id").and_then(|i| i.as_str()).unwrap_or("?");
            let marker = if Some(id) == current { "*" } else { " " };
            let created = model.get("created_at").and_then(|c| c.as_str()).unwrap_or("?");
            let architecture = model
                .get("architecture")
                .map(format_value)
                .unwrap_or_default();
            let accuracy = model
                .get("final_validation_accuracy")
                .and_then(|a| a.as_f64())
                .unwrap_or_default();
            println!(
                "{marker} {id}  {created}  layers {architecture}  validation accuracy {accuracy:.4}"
            );
        }
    }
    Ok(())
}

fn output_generic_human(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                match val {
                    serde_json::Value::Object(inner) => {
                        println!("{key}:");
                        for (inner_key, inner_val) in inner {
                            println!("  {inner_key}: {}", format_value(inner_val));
                        }
                    }
                    _ => println!("{key}: {}", format_value(val)),
                }
            }
        }
        _ => println!("{}", format_value(value)),
    }
    Ok(())
}

fn output_json<T: Serialize>(result: &T, args: &PrefnetArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

/// Render a JSON value on one line, with floats at four decimals.
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) if n.is_f64() => {
            format!("{:.4}", n.as_f64().unwrap_or_default())
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        serde_json::Value::Object(_) => value.to_string(),
    }
}
