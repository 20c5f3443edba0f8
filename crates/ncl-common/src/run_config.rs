//! Run configuration for a prediction/submission round.
//!
//! Users describe the model, the data files, and the neutralization settings
//! in YAML, JSON, or TOML. Everything that used to be hardcoded in the
//! scheduled job (model id, feature list, column names) lives here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NclError, Result};

/// Complete configuration for one `ncl` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model whose predictions are submitted
    #[serde(default)]
    pub model: ModelConfig,

    /// Input files and data directory
    #[serde(default)]
    pub data: DataConfig,

    /// Column names in the live/training tables
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Feature neutralization settings
    #[serde(default)]
    pub neutralization: NeutralizationConfig,

    /// Where submission files are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Feature-risk audit options
    #[serde(default)]
    pub audit: AuditConfig,
}

// ── Model ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Tournament model id the predictions belong to
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,

    /// Short name used to derive prediction column names
    #[serde(default = "default_model_name")]
    pub name: String,
}

fn default_model_name() -> String { "model".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: default_model_name(),
        }
    }
}

impl ModelConfig {
    /// Raw model output column, e.g. `preds_model`.
    pub fn prediction_column(&self) -> String {
        format!("preds_{}", self.name)
    }

    /// Neutralized output column, e.g. `preds_model_neutral_riskiest_50`.
    pub fn neutral_column(&self) -> String {
        format!("preds_{}_neutral_riskiest_50", self.name)
    }
}

// ── Data ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the data files (defaults to the user cache dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Current tournament round, used in output file names
    #[serde(default)]
    pub round: Option<u32>,

    #[serde(default = "default_live_file")]
    pub live_file: String,

    #[serde(default = "default_training_file")]
    pub training_file: String,

    #[serde(default = "default_features_file")]
    pub features_file: String,

    /// Named feature set from the metadata file (small, medium, all)
    #[serde(default = "default_feature_set")]
    pub feature_set: String,

    /// Optional CSV of externally computed predictions keyed by row id
    #[serde(default)]
    pub predictions_file: Option<String>,
}

fn default_live_file() -> String { "live.csv".to_string() }
fn default_training_file() -> String { "train.csv".to_string() }
fn default_features_file() -> String { "features.json".to_string() }
fn default_feature_set() -> String { "small".to_string() }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: None,
            round: None,
            live_file: default_live_file(),
            training_file: default_training_file(),
            features_file: default_features_file(),
            feature_set: default_feature_set(),
            predictions_file: None,
        }
    }
}

// ── Columns ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_id_col")]
    pub id: String,

    #[serde(default = "default_era_col")]
    pub era: String,

    #[serde(default = "default_data_type_col")]
    pub data_type: String,

    #[serde(default = "default_target_col")]
    pub target: String,
}

fn default_id_col() -> String { "id".to_string() }
fn default_era_col() -> String { "era".to_string() }
fn default_data_type_col() -> String { "data_type".to_string() }
fn default_target_col() -> String { "target_nomi_v4_20".to_string() }

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: default_id_col(),
            era: default_era_col(),
            data_type: default_data_type_col(),
            target: default_target_col(),
        }
    }
}

// ── Neutralization ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutralizationConfig {
    /// Fraction of the linear projection removed (1.0 = full)
    #[serde(default = "default_proportion")]
    pub proportion: f64,

    /// Gaussianize scores per era before residualization
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Keep input row order instead of era-concatenation order
    #[serde(default = "default_true")]
    pub preserve_row_order: bool,

    /// Relative singular-value cutoff for the pseudo-inverse
    #[serde(default = "default_rcond")]
    pub pinv_rcond: f64,

    /// Features whose linear influence is removed from the predictions
    #[serde(default = "default_riskiest_features")]
    pub riskiest_features: Vec<String>,
}

fn default_proportion() -> f64 { 1.0 }
fn default_true() -> bool { true }
fn default_rcond() -> f64 { 1e-6 }

fn default_riskiest_features() -> Vec<String> {
    [
        "feature_censorial_leachier_rickshaw",
        "feature_trisomic_hagiographic_fragrance",
        "feature_unsustaining_chewier_adnoun",
        "feature_coastal_edible_whang",
        "feature_steric_coxcombic_relinquishment",
        "feature_cyclopedic_maestoso_daguerreotypist",
        "feature_undrilled_wheezier_countermand",
        "feature_unsizable_ancestral_collocutor",
        "feature_coraciiform_sciurine_reef",
        "feature_piping_geotactic_cusp",
        "feature_corporatist_seborrheic_hopi",
        "feature_unpainted_censual_pinacoid",
        "feature_queenliest_childing_ritual",
        "feature_godliest_consistorian_woodpecker",
        "feature_undisguised_unenviable_stamen",
        "feature_unswaddled_inenarrable_goody",
        "feature_subfusc_furriest_nervule",
        "feature_froggier_unlearned_underworkman",
        "feature_septuple_bonapartean_sanbenito",
        "feature_unreproved_cultish_glioma",
        "feature_ugrian_schizocarpic_skulk",
        "feature_iffy_pretty_gumming",
        "feature_sodding_choosy_eruption",
        "feature_tragical_rainbowy_seafarer",
        "feature_esculent_erotic_epoxy",
        "feature_elaborate_intimate_bor",
        "feature_massive_demisable_spouse",
        "feature_burning_phrygian_axinomancy",
        "feature_entopic_interpreted_subsidiary",
        "feature_unventilated_sollar_bason",
        "feature_fribble_gusseted_stickjaw",
        "feature_guardian_frore_rolling",
        "feature_bijou_penetrant_syringa",
        "feature_distressed_bloated_disquietude",
        "feature_fearsome_merry_bluewing",
        "feature_just_flavescent_draff",
        "feature_mancunian_stalky_charmeuse",
        "feature_ecstatic_foundational_crinoidea",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for NeutralizationConfig {
    fn default() -> Self {
        Self {
            proportion: default_proportion(),
            normalize: true,
            preserve_row_order: true,
            pinv_rcond: default_rcond(),
            riskiest_features: default_riskiest_features(),
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name; `{round}` is replaced by the round number or `latest`
    #[serde(default = "default_file_template")]
    pub file_template: String,
}

fn default_output_dir() -> PathBuf { PathBuf::from("./output") }
fn default_file_template() -> String { "live_predictions_{round}.csv".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            file_template: default_file_template(),
        }
    }
}

impl OutputConfig {
    pub fn submission_path(&self, round: Option<u32>) -> PathBuf {
        let round = round
            .map(|r| r.to_string())
            .unwrap_or_else(|| "latest".to_string());
        self.dir.join(self.file_template.replace("{round}", &round))
    }
}

// ── Audit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Number of biggest-change features reported
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize { 50 }

impl Default for AuditConfig {
    fn default() -> Self {
        Self { top_n: default_top_n() }
    }
}

// ── Helper Methods ────────────────────────────────────────────────────────────

impl RunConfig {
    /// Load from YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load by file extension (.yaml/.yml, .json, .toml)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("json") => Self::from_json(path),
            Some("toml") => Self::from_toml(path),
            other => Err(NclError::Config(format!(
                "Unsupported config format {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Sanity checks that cannot be expressed through serde defaults.
    pub fn validate(&self) -> Result<()> {
        if !self.neutralization.proportion.is_finite() {
            return Err(NclError::Config(
                "neutralization.proportion must be finite".to_string(),
            ));
        }
        if !(self.neutralization.pinv_rcond >= 0.0) {
            return Err(NclError::Config(
                "neutralization.pinv_rcond must be non-negative".to_string(),
            ));
        }
        if self.model.name.trim().is_empty() {
            return Err(NclError::Config("model.name must not be empty".to_string()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
