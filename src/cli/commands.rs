//! Command implementations for the prefnet CLI.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::info;

use crate::behavior::{MemoryBehaviorStore, MemoryCatalog, load_catalog_json, load_events_jsonl};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EngineConfig;
use crate::engine::{PreferenceEngine, RecommendationRequest};
use crate::error::Result;
use crate::trainer::RetrainOutcome;

/// Execute a CLI command.
pub fn execute_command(args: PrefnetArgs) -> Result<()> {
    let engine = build_engine(&args)?;

    match &args.command {
        Command::Train(train_args) => train(&engine, train_args, &args),
        Command::Retrain(train_args) => retrain(&engine, train_args, &args),
        Command::Evaluate(evaluate_args) => evaluate(&engine, evaluate_args, &args),
        Command::Recommend(recommend_args) => recommend(&engine, recommend_args, &args),
        Command::Models(models_args) => list_models(&engine, models_args, &args),
        Command::Cleanup(cleanup_args) => cleanup(&engine, cleanup_args, &args),
    }
}

/// Load configuration and input files and open the engine.
fn build_engine(args: &PrefnetArgs) -> Result<PreferenceEngine> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.registry_dir {
        config.registry.directory = Some(dir.clone());
    }
    if let Command::Evaluate(EvaluateArgs {
        limit: Some(limit), ..
    }) = &args.command
    {
        config.evaluation_sample_limit = *limit;
    }

    let events = match &args.events {
        Some(path) => load_events_jsonl(path)?,
        None => Vec::new(),
    };
    let items = match &args.catalog {
        Some(path) => load_catalog_json(path)?,
        None => Vec::new(),
    };
    info!("loaded {} events and {} catalog items", events.len(), items.len());

    PreferenceEngine::new(
        config,
        Arc::new(MemoryBehaviorStore::with_events(events)),
        Arc::new(MemoryCatalog::with_items(items)),
    )
}

fn train(engine: &PreferenceEngine, train_args: &TrainArgs, cli_args: &PrefnetArgs) -> Result<()> {
    let config = train_args.apply(engine.config().training.clone());
    let report = engine.train_now(Some(&config))?;
    output_result("Model trained successfully", &report, cli_args)
}

fn retrain(
    engine: &PreferenceEngine,
    train_args: &TrainArgs,
    cli_args: &PrefnetArgs,
) -> Result<()> {
    let config = train_args.apply(engine.config().training.clone());
    let outcome = engine.retrain(Some(&config))?;
    let message = match &outcome {
        RetrainOutcome::Promoted { .. } => "Candidate model promoted",
        RetrainOutcome::Rejected { .. } => "Candidate model rejected, current model kept",
    };
    output_result(message, &outcome, cli_args)
}

fn evaluate(
    engine: &PreferenceEngine,
    evaluate_args: &EvaluateArgs,
    cli_args: &PrefnetArgs,
) -> Result<()> {
    let report = engine.evaluate(evaluate_args.model_id)?;
    output_result("Model evaluated", &report, cli_args)
}

fn recommend(
    engine: &PreferenceEngine,
    recommend_args: &RecommendArgs,
    cli_args: &PrefnetArgs,
) -> Result<()> {
    let start_time = Instant::now();

    let mut request =
        RecommendationRequest::new(recommend_args.user_id, recommend_args.candidates.clone())
            .with_as_of(recommend_args.as_of.unwrap_or_else(Utc::now));
    if let Some(top_n) = recommend_args.top_n {
        request = request.with_top_n(top_n);
    }
    if let Some(min_score) = recommend_args.min_score {
        request = request.with_min_score(min_score);
    }
    let ranked = engine.rank(&request)?;

    output_result(
        "Recommendations",
        &RecommendationResults {
            user_id: recommend_args.user_id,
            model_id: ranked.model_id,
            recommendations: ranked.candidates,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

fn list_models(
    engine: &PreferenceEngine,
    models_args: &ModelsArgs,
    cli_args: &PrefnetArgs,
) -> Result<()> {
    let current_model_id = engine.registry().get_current().ok().map(|run| run.id);
    output_result(
        "Registered models",
        &ModelList {
            current_model_id,
            models: engine.model_history(models_args.limit),
        },
        cli_args,
    )
}

fn cleanup(
    engine: &PreferenceEngine,
    cleanup_args: &CleanupArgs,
    cli_args: &PrefnetArgs,
) -> Result<()> {
    let models_removed = engine.cleanup_models(cleanup_args.keep)?;
    output_result(
        "Cleanup complete",
        &CleanupResult {
            models_removed,
            models_remaining: engine.registry().len(),
        },
        cli_args,
    )
}
