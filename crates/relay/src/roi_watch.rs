use anyhow::{Context, Result};
use bridge::{Polygon, PolygonUpdate};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Watches a polygon file by modification time.
///
/// The file holds either a JSON array of polygons, or an object of host
/// figure settings keyed by setting name.
pub struct RoiWatch {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl RoiWatch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an update the first time the file is seen and after each
    /// change; `Ok(None)` when unchanged or nothing is drawn.
    pub fn poll(&mut self) -> Result<Option<PolygonUpdate>> {
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Cannot stat ROI file {}", self.path.display()))?;
        if self.last_modified == Some(modified) {
            return Ok(None);
        }
        // Recorded before parsing so a broken file is reported once per change
        self.last_modified = Some(modified);

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read ROI file {}", self.path.display()))?;
        let polygons = parse_polygons(&contents)
            .with_context(|| format!("Invalid ROI file {}", self.path.display()))?;

        let update = PolygonUpdate::new(polygons);
        if update.is_none() {
            tracing::info!(path = %self.path.display(), "No drawn polygons, skipping publish");
        }
        Ok(update)
    }
}

pub fn parse_polygons(contents: &str) -> Result<Vec<Polygon>> {
    match serde_json::from_str::<Value>(contents)? {
        list @ Value::Array(_) => Ok(serde_json::from_value(list)?),
        Value::Object(settings) => Ok(settings
            .iter()
            .filter_map(|(name, setting)| Polygon::from_figure_setting(name, setting))
            .collect()),
        _ => anyhow::bail!("expected a JSON array or object"),
    }
}
