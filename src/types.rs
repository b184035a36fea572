// src/types.rs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Parse timestamp. Parse Server reports `createdAt`/`updatedAt` as plain
/// ISO 8601 strings in UTC; this type carries the string form and converts to
/// and from `chrono` on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDate {
    pub iso: String,
}

impl ParseDate {
    pub fn new(iso_string: impl Into<String>) -> Self {
        ParseDate {
            iso: iso_string.into(),
        }
    }

    pub fn iso(&self) -> &str {
        &self.iso
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        ParseDate {
            iso: datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Parses the ISO string back into a `chrono` datetime. `None` when the
    /// server handed back something unparseable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.iso)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl<'de> Deserialize<'de> for ParseDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ParseDate { iso: s })
    }
}

impl Serialize for ParseDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.iso)
    }
}

/// Represents a Pointer to another Parse object.
/// Pointers are used to create relationships between objects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Pointer {
    #[serde(rename = "__type")]
    pub __type: String, // Should always be "Pointer"
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl Pointer {
    /// Creates a new Pointer.
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Pointer {
            __type: "Pointer".to_string(),
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_roundtrips_through_chrono() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let date = ParseDate::from_datetime(dt);
        assert_eq!(date.iso(), "2024-03-01T12:30:45.000Z");
        assert_eq!(date.to_datetime(), Some(dt));
    }

    #[test]
    fn date_serializes_as_plain_string() {
        let date = ParseDate::new("2024-03-01T12:30:45.000Z");
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"2024-03-01T12:30:45.000Z\"");
    }

    #[test]
    fn pointer_wire_shape() {
        let pointer = Pointer::new("Post", "abc123");
        let json = serde_json::to_value(&pointer).unwrap();
        assert_eq!(json["__type"], "Pointer");
        assert_eq!(json["className"], "Post");
        assert_eq!(json["objectId"], "abc123");
    }
}
