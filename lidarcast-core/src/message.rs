//! Broadcast Messages
//!
//! JSON payloads sent to every subscriber. Each message is a single object
//! tagged by its `type` field:
//!
//! ```json
//! {"type": "lidar_player_positions", "players": [{"x": 1.0, "y": 0.02}]}
//! {"type": "lidar_closest_distance", "distance_m": 0.73}
//! {"type": "error", "message": "Scan source unavailable: connection closed"}
//! ```

use serde::{Deserialize, Serialize};

use crate::cycle::{CycleResult, ObjectEstimate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// Object positions of one cycle
    #[serde(rename = "lidar_player_positions")]
    PlayerPositions { players: Vec<ObjectEstimate> },

    /// Nearest valid return of one cycle
    #[serde(rename = "lidar_closest_distance")]
    ClosestDistance { distance_m: f64 },

    /// Sent once before the stream is torn down
    Error { message: String },
}

impl BroadcastMessage {
    pub fn positions(result: &CycleResult) -> Self {
        BroadcastMessage::PlayerPositions {
            players: result.objects.clone(),
        }
    }

    pub fn closest_distance(result: &CycleResult) -> Option<Self> {
        result
            .closest_distance
            .map(|distance_m| BroadcastMessage::ClosestDistance { distance_m })
    }

    pub fn error(message: impl Into<String>) -> Self {
        BroadcastMessage::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BroadcastMessage::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positions_format() {
        let result = CycleResult {
            objects: vec![
                ObjectEstimate { x: 1.0, y: 0.02 },
                ObjectEstimate { x: -1.0, y: 0.0 },
            ],
            ..Default::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&BroadcastMessage::positions(&result).to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "lidar_player_positions",
                "players": [{"x": 1.0, "y": 0.02}, {"x": -1.0, "y": 0.0}]
            })
        );
    }

    #[test]
    fn test_empty_positions() {
        let json = BroadcastMessage::positions(&CycleResult::default())
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"type":"lidar_player_positions","players":[]}"#);
    }

    #[test]
    fn test_error_format() {
        let msg = BroadcastMessage::error("LIDAR connection lost");
        assert!(msg.is_error());
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"error","message":"LIDAR connection lost"}"#
        );
    }

    #[test]
    fn test_closest_distance() {
        assert_eq!(BroadcastMessage::closest_distance(&CycleResult::default()), None);

        let result = CycleResult {
            closest_distance: Some(0.73),
            ..Default::default()
        };
        let msg = BroadcastMessage::closest_distance(&result).unwrap();
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"lidar_closest_distance","distance_m":0.73}"#
        );
    }

    #[test]
    fn test_parse_back() {
        let msg: BroadcastMessage =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(msg, BroadcastMessage::error("boom"));
    }
}
