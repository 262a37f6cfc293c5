//! ROI polygon payload published to downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POLYGONS_UPDATED_EVENT: &str = "polygons_updated";

const DEFAULT_COLOR: &str = "#ffffff";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// One user-drawn region. Points are normalized `[x, y]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub show_on_camera: bool,
}

impl Polygon {
    pub fn new(name: impl Into<String>, points: Vec<[f64; 2]>) -> Self {
        Self {
            name: name.into(),
            points,
            color: default_color(),
            label: String::new(),
            show_on_camera: false,
        }
    }

    /// A polygon with no points was never drawn and is not published.
    pub fn is_drawn(&self) -> bool {
        !self.points.is_empty()
    }

    /// Build from a host figure setting:
    /// `{"figure": {"points": [[x, y], ...], "color": ...}, "label": ..., "showOnCamera": ...}`.
    ///
    /// Returns `None` when no figure is drawn or the points are unusable.
    pub fn from_figure_setting(name: &str, setting: &Value) -> Option<Self> {
        let figure = setting.get("figure")?.as_object()?;
        let points: Vec<[f64; 2]> = figure
            .get("points")?
            .as_array()?
            .iter()
            .map(parse_point)
            .collect::<Option<_>>()?;
        if points.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            points,
            color: figure
                .get("color")
                .and_then(Value::as_str)
                .map_or_else(default_color, str::to_string),
            label: setting
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            show_on_camera: setting
                .get("showOnCamera")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
        })
    }
}

fn parse_point(value: &Value) -> Option<[f64; 2]> {
    match value.as_array()?.as_slice() {
        [x, y, ..] => Some([x.as_f64()?, y.as_f64()?]),
        _ => None,
    }
}

/// `{"event": "polygons_updated", "timestamp": "<ns since epoch>", "polygons": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonUpdate {
    pub event: String,
    pub timestamp: String,
    pub polygons: Vec<Polygon>,
}

impl PolygonUpdate {
    /// Update stamped with the current time. Undrawn polygons are dropped;
    /// `None` if nothing is left to publish.
    pub fn new(polygons: Vec<Polygon>) -> Option<Self> {
        Self::at(polygons, Utc::now())
    }

    pub fn at(polygons: Vec<Polygon>, time: DateTime<Utc>) -> Option<Self> {
        let polygons: Vec<Polygon> = polygons.into_iter().filter(Polygon::is_drawn).collect();
        if polygons.is_empty() {
            return None;
        }

        // Nanoseconds overflow i64 past 2262; fall back to microsecond precision
        let timestamp = time
            .timestamp_nanos_opt()
            .map(|ns| ns.to_string())
            .unwrap_or_else(|| format!("{}000", time.timestamp_micros()));

        Some(Self {
            event: POLYGONS_UPDATED_EVENT.to_string(),
            timestamp,
            polygons,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
