use std::path::Path;

use ncl_common::{NclError, Result};
use tracing::info;

/// Write `"{id_header},prediction"` rows to `path`, creating parent
/// directories as needed. Ids and predictions must have equal length.
/// NaN predictions are written as empty cells.
pub fn write_submission(
    path: impl AsRef<Path>,
    ids: &[String],
    predictions: &[f64],
    id_header: &str,
) -> Result<()> {
    let path = path.as_ref();
    if ids.len() != predictions.len() {
        return Err(NclError::LengthMismatch {
            column: "prediction".to_string(),
            expected: ids.len(),
            actual: predictions.len(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([id_header, "prediction"])?;
    for (id, value) in ids.iter().zip(predictions) {
        let cell = if value.is_nan() {
            String::new()
        } else {
            value.to_string()
        };
        writer.write_record([id.as_str(), cell.as_str()])?;
    }
    writer.flush()?;

    info!("Wrote {} predictions to {:?}", ids.len(), path);
    Ok(())
}
