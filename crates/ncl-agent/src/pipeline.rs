//! The two end-to-end flows behind the CLI: building a neutralized
//! submission for the live round, and the offline feature-risk audit.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use ncl_common::RunConfig;
use ncl_data::{
    load_table, write_submission, ColumnPredictions, CsvPredictions, FeatureMetadata,
    PredictionSource, TableSchema,
};
use ncl_neutralizer::partition::partition;
use ncl_neutralizer::{
    biggest_change_features, era_correlations, neutralize_column, percentile_rank,
    NeutralizeOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rows of the live file that belong to the current round.
const LIVE_DATA_TYPE: &str = "live";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub model_id: Uuid,
    pub round: Option<u32>,
    pub rows: usize,
    pub eras: usize,
    /// Neutralized column the submitted percentiles were ranked from
    pub submitted_column: String,
    pub output_path: PathBuf,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub eras: usize,
    pub features_considered: usize,
    /// Most drifted first
    pub biggest_change: Vec<String>,
}

pub fn data_dir(config: &RunConfig) -> PathBuf {
    config
        .data
        .dir
        .clone()
        .unwrap_or_else(ncl_data::default_data_dir)
}

/// External prediction file when configured, otherwise the model's
/// prediction column in the live table.
pub fn prediction_source(config: &RunConfig) -> Box<dyn PredictionSource> {
    match &config.data.predictions_file {
        Some(file) => Box::new(CsvPredictions::new(
            data_dir(config).join(file),
            config.columns.id.as_str(),
            "prediction",
        )),
        None => Box::new(ColumnPredictions::new(config.model.prediction_column())),
    }
}

fn load_metadata(config: &RunConfig) -> anyhow::Result<FeatureMetadata> {
    let path = data_dir(config).join(&config.data.features_file);
    FeatureMetadata::from_path(&path)
        .with_context(|| format!("Failed to read feature metadata from {}", path.display()))
}

pub fn run_submission(config: &RunConfig) -> anyhow::Result<SubmissionSummary> {
    let source = prediction_source(config);
    run_submission_with(config, source.as_ref())
}

pub fn run_submission_with(
    config: &RunConfig,
    source: &dyn PredictionSource,
) -> anyhow::Result<SubmissionSummary> {
    let cols = &config.columns;
    let riskiest: &[String] = &config.neutralization.riskiest_features;

    let metadata = load_metadata(config)?;
    let mut read_columns = metadata.feature_set(&config.data.feature_set)?.to_vec();
    read_columns.extend(riskiest.iter().cloned());
    read_columns.push(cols.era.clone());
    read_columns.push(cols.data_type.clone());
    read_columns.extend(source.required_columns());

    let live_path = data_dir(config).join(&config.data.live_file);
    let schema = TableSchema::new()
        .with_id_column(cols.id.as_str())
        .with_text_columns([cols.era.as_str(), cols.data_type.as_str()])
        .with_columns(read_columns);
    let loaded = load_table(&live_path, &schema)
        .with_context(|| format!("Failed to load live data from {}", live_path.display()))?;
    let data_types = loaded.key_column(&cols.data_type)?;
    let live_rows: Vec<usize> = (0..loaded.len())
        .filter(|&r| data_types[r] == LIVE_DATA_TYPE)
        .collect();
    if live_rows.is_empty() {
        anyhow::bail!(
            "No rows with {} = '{}' in {}",
            cols.data_type,
            LIVE_DATA_TYPE,
            live_path.display()
        );
    }
    if live_rows.len() < loaded.len() {
        info!(
            "Skipping {} non-live rows",
            loaded.len() - live_rows.len()
        );
    }
    let mut live = loaded.take_rows(&live_rows);

    let keys = live.key_column(&cols.era)?;
    let eras = partition(&keys);
    for era in eras.iter().filter(|p| p.len() < 2) {
        warn!(
            "Era {} has {} row(s); its neutralized predictions will be non-finite",
            era.key,
            era.len()
        );
    }

    info!("Predicting {} live rows from {}", live.len(), source.describe());
    let prediction_column = config.model.prediction_column();
    let preds = source.predictions(&live)?;
    live.add_numeric_column(prediction_column.as_str(), preds)?;

    let opts = NeutralizeOptions::from_config(&config.neutralization, &cols.era);
    let neutral = neutralize_column(&live, &prediction_column, riskiest, &opts)?;
    let non_finite = neutral.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        warn!("{} neutralized predictions are not finite", non_finite);
    }
    debug!(
        "Neutralized {} against {} features (proportion {})",
        prediction_column,
        riskiest.len(),
        opts.proportion
    );

    let submitted = percentile_rank(&neutral);

    let output_path = config.output.submission_path(config.data.round);
    write_submission(&output_path, live.ids(), &submitted, &cols.id)?;

    Ok(SubmissionSummary {
        model_id: config.model.id,
        round: config.data.round,
        rows: live.len(),
        eras: eras.len(),
        submitted_column: config.model.neutral_column(),
        output_path,
        generated_at: Utc::now(),
    })
}

pub fn run_audit(config: &RunConfig) -> anyhow::Result<AuditReport> {
    let cols = &config.columns;
    let metadata = load_metadata(config)?;
    let features = metadata.feature_set(&config.data.feature_set)?;

    let mut read_columns = features.to_vec();
    read_columns.push(cols.era.clone());
    read_columns.push(cols.target.clone());

    let train_path = data_dir(config).join(&config.data.training_file);
    let schema = TableSchema::new()
        .with_id_column(cols.id.as_str())
        .with_text_columns([cols.era.as_str()])
        .with_columns(read_columns);
    let train = load_table(&train_path, &schema)
        .with_context(|| format!("Failed to load training data from {}", train_path.display()))?;

    let corrs = era_correlations(&train, features, &cols.target, &cols.era)?;
    let biggest_change = biggest_change_features(&corrs, config.audit.top_n);
    info!(
        "Audited {} features over {} eras; top drift: {:?}",
        features.len(),
        corrs.eras.len(),
        biggest_change.first()
    );

    Ok(AuditReport {
        eras: corrs.eras.len(),
        features_considered: features.len(),
        biggest_change,
    })
}
