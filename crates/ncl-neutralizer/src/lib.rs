//! ncl-neutralizer — Era-wise Gaussian rank neutralization of model predictions.
//!
//! The pipeline per era is: Gaussianize the scores, project them onto the
//! exposure (risky feature) columns, subtract the projection, and rescale
//! to unit standard deviation.

pub mod table;
pub mod partition;
pub mod normalise;
pub mod linalg;
pub mod neutralize;
pub mod feature_risk;

pub use feature_risk::{biggest_change_features, era_correlations, EraCorrelations};
pub use neutralize::{neutralize, neutralize_column, NeutralizeOptions, RowOrder};
pub use normalise::{gaussianize, inverse_normal_cdf, ordinal_ranks, percentile_rank};
pub use table::{ColumnData, RowTable, TableBuilder};
