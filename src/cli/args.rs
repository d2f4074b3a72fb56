//! Command line argument parsing for the prefnet CLI using clap.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::network::Activation;
use crate::trainer::{StoppingPolicy, TrainingConfig};

/// prefnet - behavior-driven preference prediction
#[derive(Parser, Debug, Clone)]
#[command(name = "prefnet")]
#[command(about = "Train and serve neural preference models from user behavior")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PrefnetArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model registry directory (models are kept in memory when unset)
    #[arg(long, env = "PREFNET_REGISTRY_DIR", global = true)]
    pub registry_dir: Option<PathBuf>,

    /// Behavior events, one JSON object per line
    #[arg(long, global = true)]
    pub events: Option<PathBuf>,

    /// Item catalog as a JSON array
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PrefnetArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a model and make it current
    Train(TrainArgs),

    /// Train a candidate and promote it only if it validates at least as well
    Retrain(TrainArgs),

    /// Measure a model's accuracy on recent behavior
    Evaluate(EvaluateArgs),

    /// Rank candidate items for a user
    Recommend(RecommendArgs),

    /// List registered models, newest first
    Models(ModelsArgs),

    /// Delete old models
    Cleanup(CleanupArgs),
}

/// Training overrides. Unset flags keep the configured values.
#[derive(Args, Debug, Clone, Default)]
pub struct TrainArgs {
    /// Hidden layer sizes, comma separated (e.g. 8,6)
    #[arg(long, value_delimiter = ',')]
    pub hidden_layers: Option<Vec<usize>>,

    /// Learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Number of epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Fraction of examples held out for validation
    #[arg(long)]
    pub validation_split: Option<f64>,

    /// Maximum number of examples pulled from the event log
    #[arg(long)]
    pub limit: Option<usize>,

    /// Hidden layer activation (sigmoid, tanh, relu)
    #[arg(long)]
    pub activation: Option<Activation>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Minimum number of examples required to train
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Stop after this many epochs without validation improvement
    #[arg(long)]
    pub patience: Option<usize>,

    /// Minimum validation loss improvement counted by --patience
    #[arg(long, default_value_t = 0.0, requires = "patience")]
    pub min_delta: f64,
}

impl TrainArgs {
    /// Apply the flags on top of `base`.
    pub fn apply(&self, mut base: TrainingConfig) -> TrainingConfig {
        if let Some(hidden_layers) = &self.hidden_layers {
            base.hidden_layers = hidden_layers.clone();
        }
        if let Some(learning_rate) = self.learning_rate {
            base.learning_rate = learning_rate;
        }
        if let Some(epochs) = self.epochs {
            base.epochs = epochs;
        }
        if let Some(validation_split) = self.validation_split {
            base.validation_split = validation_split;
        }
        if let Some(limit) = self.limit {
            base.training_data_limit = limit;
        }
        if let Some(activation) = self.activation {
            base.activation_function = activation;
        }
        if let Some(seed) = self.seed {
            base.seed = seed;
        }
        if let Some(min_samples) = self.min_samples {
            base.min_training_samples = min_samples;
        }
        if let Some(patience) = self.patience {
            base.stopping = StoppingPolicy::EarlyStopping {
                patience,
                min_delta: self.min_delta,
            };
        }
        base
    }
}

/// Arguments for evaluating a model
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Model to evaluate (defaults to the current model)
    #[arg(long)]
    pub model_id: Option<Uuid>,

    /// Number of recent user/item pairs to evaluate on
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments for ranking candidates
#[derive(Args, Debug, Clone)]
pub struct RecommendArgs {
    /// User to recommend for
    pub user_id: u64,

    /// Candidate item ids, comma separated
    #[arg(value_delimiter = ',', required = true)]
    pub candidates: Vec<u64>,

    /// Return at most this many items
    #[arg(short = 'n', long)]
    pub top_n: Option<usize>,

    /// Drop items scoring below this value (0 to 1)
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Compute features as of this RFC 3339 time (defaults to now)
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
}

/// Arguments for listing models
#[derive(Args, Debug, Clone)]
pub struct ModelsArgs {
    /// Show at most this many models
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for deleting old models
#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Number of newest models to keep
    #[arg(short, long, default_value_t = 5)]
    pub keep: usize,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_command() {
        let args = PrefnetArgs::try_parse_from([
            "prefnet",
            "--events",
            "events.jsonl",
            "train",
            "--hidden-layers",
            "16,8",
            "--epochs",
            "20",
            "--activation",
            "tanh",
        ])
        .unwrap();

        assert_eq!(args.events, Some(PathBuf::from("events.jsonl")));
        if let Command::Train(train_args) = args.command {
            let config = train_args.apply(TrainingConfig::default());
            assert_eq!(config.hidden_layers, vec![16, 8]);
            assert_eq!(config.epochs, 20);
            assert_eq!(config.activation_function, Activation::Tanh);
            assert_eq!(config.learning_rate, 0.01);
            assert_eq!(config.stopping, StoppingPolicy::FixedEpochs);
        } else {
            panic!("Expected Train command");
        }
    }

    #[test]
    fn test_early_stopping_flags() {
        let args = PrefnetArgs::try_parse_from([
            "prefnet",
            "retrain",
            "--patience",
            "4",
            "--min-delta",
            "0.01",
        ])
        .unwrap();

        if let Command::Retrain(train_args) = args.command {
            let config = train_args.apply(TrainingConfig::default());
            assert_eq!(
                config.stopping,
                StoppingPolicy::EarlyStopping {
                    patience: 4,
                    min_delta: 0.01
                }
            );
        } else {
            panic!("Expected Retrain command");
        }
    }

    #[test]
    fn test_recommend_command() {
        let args = PrefnetArgs::try_parse_from([
            "prefnet",
            "recommend",
            "7",
            "10,11,12",
            "-n",
            "2",
            "--min-score",
            "0.3",
            "--as-of",
            "2024-06-01T00:00:00Z",
        ])
        .unwrap();

        if let Command::Recommend(recommend_args) = args.command {
            assert_eq!(recommend_args.user_id, 7);
            assert_eq!(recommend_args.candidates, vec![10, 11, 12]);
            assert_eq!(recommend_args.top_n, Some(2));
            assert_eq!(recommend_args.min_score, Some(0.3));
            assert!(recommend_args.as_of.is_some());
        } else {
            panic!("Expected Recommend command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = PrefnetArgs::try_parse_from(["prefnet", "models"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = PrefnetArgs::try_parse_from(["prefnet", "-vv", "models"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = PrefnetArgs::try_parse_from(["prefnet", "models", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format_and_cleanup_default() {
        let args =
            PrefnetArgs::try_parse_from(["prefnet", "--format", "json", "cleanup"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        if let Command::Cleanup(cleanup_args) = args.command {
            assert_eq!(cleanup_args.keep, 5);
        } else {
            panic!("Expected Cleanup command");
        }
    }

    #[test]
    fn test_rejects_unknown_activation() {
        assert!(
            PrefnetArgs::try_parse_from(["prefnet", "train", "--activation", "softmax"]).is_err()
        );
    }
}
