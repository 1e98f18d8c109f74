//! Participant identity and presence data

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Color given to participants whose snapshot carries none, and to the
/// offline sentinel.
pub const DEFAULT_COLOR: &str = "#000000";

/// Stable identifier of a participant, assigned by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create a new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty ID carried by the offline sentinel
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A participant present in the current channel.
///
/// Attributes the protocol does not name are kept verbatim in `attributes`
/// and serialized back inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Participant {
    /// The sentinel returned by lookups that miss
    pub fn offline() -> Self {
        Self {
            id: ParticipantId::default(),
            name: String::new(),
            color: default_color(),
            x: 0.0,
            y: 0.0,
            attributes: Map::new(),
        }
    }

    /// Whether this value is the offline sentinel
    pub fn is_offline(&self) -> bool {
        self.id.is_empty()
    }

    /// Merge the fields present in `update`; absent fields keep their value.
    pub fn apply(&mut self, update: ParticipantUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        self.attributes.extend(update.attributes);
    }
}

impl From<ParticipantUpdate> for Participant {
    fn from(update: ParticipantUpdate) -> Self {
        Self {
            id: update.id,
            name: update.name.unwrap_or_default(),
            color: update.color.unwrap_or_else(default_color),
            x: update.x.unwrap_or_default(),
            y: update.y.unwrap_or_default(),
            attributes: update.attributes,
        }
    }
}

/// Partial participant data, as carried by snapshots and presence updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ParticipantUpdate {
    /// Create an update that carries only an ID
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Servers send positions either as numbers or as numeric strings.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_participant_id_display() {
        let id = ParticipantId::new("u42");
        assert_eq!(format!("{}", id), "u42");
    }

    #[test]
    fn test_offline_sentinel() {
        let offline = Participant::offline();
        assert!(offline.is_offline());
        assert_eq!(offline.name, "");
        assert_eq!(offline.color, DEFAULT_COLOR);
    }

    #[test]
    fn test_update_accepts_string_coordinates() {
        let update: ParticipantUpdate =
            serde_json::from_value(json!({"id": "u1", "x": "12.5", "y": 40})).unwrap();
        assert_eq!(update.x, Some(12.5));
        assert_eq!(update.y, Some(40.0));
        assert!(update.attributes.is_empty());
    }

    #[test]
    fn test_update_keeps_unknown_attributes() {
        let update: ParticipantUpdate =
            serde_json::from_value(json!({"id": "u1", "tag": {"text": "BOT"}})).unwrap();
        assert_eq!(update.attributes["tag"], json!({"text": "BOT"}));
    }

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut participant = Participant::from(
            ParticipantUpdate::new("u1")
                .with_name("Alice")
                .with_color("#ff0000")
                .with_position(10.0, 20.0),
        );

        participant.apply(ParticipantUpdate::new("u1").with_position(30.0, 40.0));

        assert_eq!(participant.name, "Alice");
        assert_eq!(participant.color, "#ff0000");
        assert_eq!((participant.x, participant.y), (30.0, 40.0));
    }

    #[test]
    fn test_from_update_fills_defaults() {
        let participant = Participant::from(ParticipantUpdate::new("u2"));
        assert_eq!(participant.id.as_str(), "u2");
        assert_eq!(participant.name, "");
        assert_eq!(participant.color, DEFAULT_COLOR);
        assert_eq!((participant.x, participant.y), (0.0, 0.0));
    }

    #[test]
    fn test_participant_serializes_attributes_inline() {
        let participant = Participant::from(
            ParticipantUpdate::new("u3").with_attribute("afk", json!(true)),
        );
        let value = serde_json::to_value(&participant).unwrap();
        assert_eq!(value["afk"], json!(true));
        assert_eq!(value["id"], json!("u3"));
    }
}
