//! Command-line interface for training and single-row prediction

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::{ArtifactStore, DEFAULT_ARTIFACT_DIR, DEFAULT_SOURCE_PATH};
use crate::pipeline::{CustomData, PipelineConfig, PredictPipeline, TrainingPipeline};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<28} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mlops-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve the student math score regressor")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest, transform, and search every registered regressor
    Train {
        /// Raw dataset (CSV)
        #[arg(short, long, default_value = DEFAULT_SOURCE_PATH)]
        data: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_DIR)]
        artifacts: PathBuf,

        /// Candidates sampled per regressor
        #[arg(long, default_value = "30")]
        n_iter: usize,

        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        cv: usize,
    },

    /// Ingest, transform, and fit a single linear regression
    TrainLinear {
        /// Raw dataset (CSV)
        #[arg(short, long, default_value = DEFAULT_SOURCE_PATH)]
        data: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_DIR)]
        artifacts: PathBuf,
    },

    /// Predict the math score of one student
    Predict {
        #[arg(long)]
        gender: String,

        #[arg(long)]
        race_ethnicity: String,

        #[arg(long)]
        parental_level_of_education: String,

        #[arg(long)]
        lunch: String,

        #[arg(long)]
        test_preparation_course: String,

        #[arg(long)]
        reading_score: f64,

        #[arg(long)]
        writing_score: f64,

        /// Artifact directory
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_DIR)]
        artifacts: PathBuf,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Train {
            data: PathBuf::from(DEFAULT_SOURCE_PATH),
            artifacts: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            n_iter: 30,
            cv: 5,
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Train { data, artifacts, n_iter, cv } => cmd_train(&data, &artifacts, n_iter, cv),
        Commands::TrainLinear { data, artifacts } => cmd_train_linear(&data, &artifacts),
        Commands::Predict {
            gender,
            race_ethnicity,
            parental_level_of_education,
            lunch,
            test_preparation_course,
            reading_score,
            writing_score,
            artifacts,
        } => {
            let data = CustomData::new(
                gender,
                race_ethnicity,
                parental_level_of_education,
                lunch,
                test_preparation_course,
                reading_score,
                writing_score,
            );
            cmd_predict(&data, &artifacts)
        }
    }
}

pub fn cmd_train(data: &Path, artifacts: &Path, n_iter: usize, cv: usize) -> anyhow::Result<()> {
    section("Train");
    kv("Dataset", &data.display().to_string());
    kv("Artifacts", &artifacts.display().to_string());

    step_run(&format!("Searching {} candidates per model, {}-fold", n_iter, cv));
    let start = Instant::now();
    let config = PipelineConfig::in_dir(artifacts, data).with_cv(cv);
    let best_score = TrainingPipeline::new(config.clone()).initiate_model_training(n_iter)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let metrics = DataLoader::load_csv(&config.model_search.metrics_path)?;
    print_score_table(&metrics)?;

    println!();
    println!(
        "  {:<28} {}",
        muted("Best validation R²"),
        format!("{:.4}", best_score).white().bold()
    );
    println!();
    Ok(())
}

pub fn cmd_train_linear(data: &Path, artifacts: &Path) -> anyhow::Result<()> {
    section("Train linear");
    kv("Dataset", &data.display().to_string());

    step_run("Fitting linear regression");
    let start = Instant::now();
    let config = PipelineConfig::in_dir(artifacts, data);
    let metrics = TrainingPipeline::new(config).initiate_linear_training()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    kv("R²", &format!("{:.4}", metrics.r2));
    kv("RMSE", &format!("{:.4}", metrics.rmse));
    kv("MAE", &format!("{:.4}", metrics.mae));
    println!();
    Ok(())
}

pub fn cmd_predict(data: &CustomData, artifacts: &Path) -> anyhow::Result<()> {
    section("Predict");

    let pipeline = PredictPipeline::from_store(&ArtifactStore::new(artifacts))?;
    kv("Model", pipeline.model().name());

    let features = data.get_data_as_df()?;
    let prediction = pipeline.predict(&features)?;

    println!();
    println!(
        "  {:<28} {}",
        muted("Predicted math score"),
        prediction.to_string().white().bold()
    );
    println!();
    Ok(())
}

fn print_score_table(metrics: &DataFrame) -> anyhow::Result<()> {
    let models = metrics.column("model")?.str()?.clone();
    let validation = metrics.column("validation_scores")?.cast(&DataType::Float64)?;
    let test = metrics.column("test_scores")?.cast(&DataType::Float64)?;
    let validation = validation.f64()?;
    let test = test.f64()?;

    println!();
    println!(
        "  {:<24} {:>12} {:>10}",
        muted("Model"),
        muted("Validation"),
        muted("Test")
    );
    println!("  {}", dim(&"─".repeat(48)));
    for i in 0..metrics.height() {
        println!(
            "  {:<24} {:>12.4} {:>10.4}",
            models.get(i).unwrap_or("?"),
            validation.get(i).unwrap_or(f64::NAN),
            test.get(i).unwrap_or(f64::NAN)
        );
    }
    println!("  {}", dim(&"─".repeat(48)));
    Ok(())
}
