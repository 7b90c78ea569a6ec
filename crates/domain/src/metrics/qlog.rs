use serde::Serialize;

/// One structured protocol trace record, loosely following the qlog event
/// shape (`time` in milliseconds relative to the start of the collector).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QlogEvent {
    pub time: f64,
    pub name: String,
    pub data: serde_json::Value,
}
