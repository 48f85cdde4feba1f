//! Integration test: Full pipeline (ingest → transform → search → predict)

use mlops_pipeline::artifacts::ArtifactStore;
use mlops_pipeline::components::PersistPolicy;
use mlops_pipeline::pipeline::{CustomData, PipelineConfig, PredictPipeline, TrainingPipeline};
use mlops_pipeline::training::{Estimator, EstimatorRegistry};
use mlops_pipeline::utils::{column_to_vec, DataLoader};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EDUCATION: [&str; 6] = [
    "bachelor's degree",
    "some college",
    "master's degree",
    "associate's degree",
    "high school",
    "some high school",
];

/// Student table whose math score is a bounded function of the inputs
fn create_student_dataset(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut gender = Vec::with_capacity(n);
    let mut race = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut lunch = Vec::with_capacity(n);
    let mut prep = Vec::with_capacity(n);
    let mut reading = Vec::with_capacity(n);
    let mut writing = Vec::with_capacity(n);
    let mut math = Vec::with_capacity(n);

    for i in 0..n {
        let r: i64 = rng.gen_range(30..=100);
        let w: i64 = (r + rng.gen_range(-8..=8)).clamp(25, 100);
        let standard = i % 3 != 0;
        let completed = i % 4 == 0;
        let m = 0.55 * r as f64
            + 0.35 * w as f64
            + if standard { 6.0 } else { 0.0 }
            + if completed { 4.0 } else { 0.0 }
            + rng.gen_range(-3.0..3.0);

        gender.push(if i % 2 == 0 { "female" } else { "male" });
        race.push(["group A", "group B", "group C", "group D", "group E"][i % 5]);
        education.push(EDUCATION[i % 6]);
        lunch.push(if standard { "standard" } else { "free/reduced" });
        prep.push(if completed { "completed" } else { "none" });
        reading.push(r);
        writing.push(w);
        math.push(m.round().clamp(10.0, 100.0) as i64);
    }

    df!(
        "gender" => gender,
        "race_ethnicity" => race,
        "parental_level_of_education" => education,
        "lunch" => lunch,
        "test_preparation_course" => prep,
        "math_score" => math,
        "reading_score" => reading,
        "writing_score" => writing
    )
    .unwrap()
}

fn write_dataset(dir: &Path, n: usize) -> PathBuf {
    let path = dir.join("stud.csv");
    let mut df = create_student_dataset(n);
    DataLoader::save_csv(&mut df, &path).unwrap();
    path
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

#[test]
fn test_training_pipeline_writes_every_artifact() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 150);
    let root = temp.path().join("artifacts");

    let registry = EstimatorRegistry::default_registry()
        .subset(&["Linear Regression", "Decision Tree"])
        .unwrap();
    let config = PipelineConfig::in_dir(&root, &source).with_cv(3);
    let pipeline = TrainingPipeline::new(config).with_registry(registry);

    let best = pipeline.initiate_model_training(4).unwrap();
    assert!(best > 0.5, "best validation score too low: {}", best);
    assert!(best <= 1.0);

    let store = ArtifactStore::new(&root);
    for path in [
        store.raw_data_path(),
        store.train_data_path(),
        store.test_data_path(),
        store.preprocessor_path(),
        store.regressor_path(),
        store.metrics_path(),
        store.search_results_path(),
    ] {
        assert!(path.exists(), "missing artifact {}", path.display());
    }

    let metrics = DataLoader::load_csv(&store.metrics_path()).unwrap();
    assert_eq!(metrics.height(), 2);

    // the default policy records the last registry entry searched
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.search_results_path()).unwrap())
            .unwrap();
    assert_eq!(record["model"], "Decision Tree");
    assert_eq!(record["candidates"].as_array().unwrap().len(), 4);
}

#[test]
fn test_split_partitions_the_dataset() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 101);
    let root = temp.path().join("artifacts");

    let registry = EstimatorRegistry::default_registry()
        .subset(&["Linear Regression"])
        .unwrap();
    TrainingPipeline::new(PipelineConfig::in_dir(&root, &source).with_cv(2))
        .with_registry(registry)
        .initiate_model_training(2)
        .unwrap();

    let store = ArtifactStore::new(&root);
    let raw = DataLoader::load_csv(&store.raw_data_path()).unwrap();
    let train = DataLoader::load_csv(&store.train_data_path()).unwrap();
    let test = DataLoader::load_csv(&store.test_data_path()).unwrap();

    assert_eq!(raw.height(), 101);
    assert_eq!(test.height(), 21);
    assert_eq!(train.height(), 80);

    // every source row lands in exactly one partition
    for column in ["reading_score", "writing_score", "math_score"] {
        let mut combined = column_to_vec(&train, column).unwrap();
        combined.extend(column_to_vec(&test, column).unwrap());
        assert_eq!(
            sorted(combined),
            sorted(column_to_vec(&raw, column).unwrap()),
            "column {} is not partitioned",
            column
        );
    }
}

#[test]
fn test_train_then_predict() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 150);
    let root = temp.path().join("artifacts");

    let registry = EstimatorRegistry::default_registry()
        .subset(&["Linear Regression", "Decision Tree"])
        .unwrap();
    TrainingPipeline::new(PipelineConfig::in_dir(&root, &source).with_cv(3))
        .with_registry(registry)
        .initiate_model_training(3)
        .unwrap();

    let pipeline = PredictPipeline::from_store(&ArtifactStore::new(&root)).unwrap();
    assert_eq!(pipeline.model().name(), "Decision Tree");

    let data = CustomData::new(
        "female",
        "group B",
        "bachelor's degree",
        "standard",
        "none",
        72.0,
        74.0,
    );
    let prediction = pipeline.predict(&data.get_data_as_df().unwrap()).unwrap();
    assert!(
        (10..=100).contains(&prediction),
        "prediction out of label range: {}",
        prediction
    );
}

#[test]
fn test_predict_rejects_unseen_category() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 80);
    let root = temp.path().join("artifacts");

    let registry = EstimatorRegistry::default_registry()
        .subset(&["Linear Regression"])
        .unwrap();
    TrainingPipeline::new(PipelineConfig::in_dir(&root, &source).with_cv(2))
        .with_registry(registry)
        .initiate_model_training(2)
        .unwrap();

    let pipeline = PredictPipeline::from_store(&ArtifactStore::new(&root)).unwrap();
    let data = CustomData::new(
        "female",
        "group Z",
        "high school",
        "standard",
        "none",
        60.0,
        62.0,
    );
    assert!(pipeline.predict(&data.get_data_as_df().unwrap()).is_err());
}

#[test]
fn test_best_validation_policy_persists_best_model() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 150);
    let root = temp.path().join("artifacts");

    let registry = EstimatorRegistry::default_registry()
        .subset(&["Linear Regression", "Decision Tree"])
        .unwrap();
    let config = PipelineConfig::in_dir(&root, &source)
        .with_cv(3)
        .with_persist_policy(PersistPolicy::BestValidation);
    TrainingPipeline::new(config)
        .with_registry(registry)
        .initiate_model_training(4)
        .unwrap();

    // the score is close to linear in the scaled features
    let estimator = Estimator::load(&ArtifactStore::new(&root).regressor_path()).unwrap();
    assert_eq!(estimator.name(), "Linear Regression");
}

#[test]
fn test_default_registry_end_to_end() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 120);
    let root = temp.path().join("artifacts");

    let best = TrainingPipeline::new(PipelineConfig::in_dir(&root, &source).with_cv(2))
        .initiate_model_training(12)
        .unwrap();
    assert!(best.is_finite());

    let store = ArtifactStore::new(&root);
    let metrics = DataLoader::load_csv(&store.metrics_path()).unwrap();
    assert_eq!(metrics.height(), 5);

    let models: Vec<String> = metrics
        .column("model")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(
        models,
        vec![
            "Linear Regression",
            "Decision Tree",
            "Random Forest",
            "Gradient Boosting",
            "AdaBoost Regressor"
        ]
    );

    let estimator = Estimator::load(&store.regressor_path()).unwrap();
    assert_eq!(estimator.name(), "AdaBoost Regressor");
}

#[test]
fn test_linear_training_path() {
    let temp = TempDir::new().unwrap();
    let source = write_dataset(temp.path(), 120);
    let root = temp.path().join("artifacts");

    let metrics = TrainingPipeline::new(PipelineConfig::in_dir(&root, &source))
        .initiate_linear_training()
        .unwrap();
    assert!(metrics.r2 > 0.8, "linear r2 too low: {}", metrics.r2);
    assert!(metrics.rmse >= metrics.mae);

    let table = DataLoader::load_csv(&ArtifactStore::new(&root).metrics_path()).unwrap();
    assert_eq!(table.height(), 1);
}
