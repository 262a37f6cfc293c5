//! Detection message decoding.
//!
//! Field typing is lenient: an optional field with the wrong JSON type is
//! treated as absent, and an element without a usable `bbox` is dropped.
//! Only a payload that is not a JSON object with a `detections` array fails.

use crate::types::DetectedObject;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no 'detections' array")]
    MissingDetections,
}

pub fn decode_detections(payload: &[u8]) -> Result<Vec<DetectedObject>, DecodeError> {
    let message: Value = serde_json::from_slice(payload)?;
    let fields = message.as_object().ok_or(DecodeError::NotAnObject)?;
    let detections = fields
        .get("detections")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingDetections)?;

    Ok(detections
        .iter()
        .filter_map(Value::as_object)
        .filter_map(parse_detection)
        .collect())
}

fn parse_detection(fields: &Map<String, Value>) -> Option<DetectedObject> {
    let [x, y, width, height] = parse_bbox(fields.get("bbox")?)?;

    Some(DetectedObject {
        label: fields
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        confidence: fields
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or_default() as f32,
        x,
        y,
        width,
        height,
        track_id: fields.get("trackId").and_then(as_integer).unwrap_or_default(),
    })
}

/// `[x, y, width, height, ...]`; extra elements are ignored.
fn parse_bbox(value: &Value) -> Option<[f32; 4]> {
    match value.as_array()?.as_slice() {
        [x, y, width, height, ..] => Some([
            x.as_f64()? as f32,
            y.as_f64()? as f32,
            width.as_f64()? as f32,
            height.as_f64()? as f32,
        ]),
        _ => None,
    }
}

/// Track ids arrive as integers, but some producers emit `3.0`.
fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number as i64))
}
