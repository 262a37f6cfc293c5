/// One detected object, as delivered by the external detection source.
/// Coordinates are normalized to `[0, 1]` with a top-left origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedObject {
    pub label: String,
    /// Optional display name sent alongside the class label
    pub name: Option<String>,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub track_id: i64,
}
