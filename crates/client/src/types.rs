// Records shared by events and files

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Box user attached to events and files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub login: String,
}

/// Folder that contains an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemParent {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub sequence_id: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Opaque event-log cursor. Empty means the log is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StreamPosition(String);

impl StreamPosition {
    pub fn new(position: impl Into<String>) -> Self {
        Self(position.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the API signalled there is nothing after this point
    pub fn is_exhausted(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamPosition {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamPosition {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// The API sends admin_logs positions as strings and user-stream positions as
// numbers; accept both, and null as exhausted.
impl<'de> Deserialize<'de> for StreamPosition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(s)) => Self(s),
            Some(Raw::Number(n)) => Self(n.to_string()),
            None => Self::default(),
        })
    }
}

/// Treat an explicit JSON null like a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a number either as a JSON number or as a numeric string ("100")
pub(crate) fn string_or_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_position_from_string_number_null() {
        let p: StreamPosition = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(p.as_str(), "abc123");

        let p: StreamPosition = serde_json::from_str("1152922976252290886").unwrap();
        assert_eq!(p.as_str(), "1152922976252290886");

        let p: StreamPosition = serde_json::from_str("null").unwrap();
        assert!(p.is_exhausted());
    }

    #[derive(Debug, Deserialize)]
    struct Limit {
        #[serde(deserialize_with = "string_or_number")]
        value: u32,
    }

    #[test]
    fn test_string_or_number() {
        let n: Limit = serde_json::from_str(r#"{"value": 100}"#).unwrap();
        assert_eq!(n.value, 100);

        let s: Limit = serde_json::from_str(r#"{"value": " 250 "}"#).unwrap();
        assert_eq!(s.value, 250);

        let err = serde_json::from_str::<Limit>(r#"{"value": "lots"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid number"));
        assert!(serde_json::from_str::<Limit>(r#"{"value": "-1"}"#).is_err());
    }

    #[test]
    fn test_stream_position_serializes_as_string() {
        let json = serde_json::to_string(&StreamPosition::new("def456")).unwrap();
        assert_eq!(json, "\"def456\"");
    }

    #[test]
    fn test_user_with_nulls() {
        let user: User =
            serde_json::from_str(r#"{"type":"user","id":"11","name":null}"#).unwrap();
        assert_eq!(user.kind, "user");
        assert_eq!(user.id, "11");
        assert_eq!(user.name, "");
        assert_eq!(user.login, "");
    }

    #[test]
    fn test_item_parent() {
        let parent: ItemParent = serde_json::from_str(
            r#"{"type":"folder","id":"0","sequence_id":null,"etag":null,"name":"All Files"}"#,
        )
        .unwrap();
        assert_eq!(parent.kind, "folder");
        assert!(parent.sequence_id.is_none());
        assert_eq!(parent.name, "All Files");
    }
}
