//! Serde helpers for the job snapshot wire format.
//!
//! Timestamps travel as fractional Unix seconds and an empty tag set travels as
//! `{}` rather than `[]`. Existing clients depend on both.

use chrono::{DateTime, Utc};

/// Convert a timestamp to fractional Unix seconds (microsecond precision).
pub fn to_epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Convert fractional Unix seconds back to a timestamp.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
}

/// `#[serde(with = "epoch_seconds")]` for `DateTime<Utc>`.
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::to_epoch_seconds(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        super::from_epoch_seconds(seconds)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

/// `#[serde(with = "epoch_seconds_option")]` for `Option<DateTime<Utc>>`; `None` is `null`.
pub mod epoch_seconds_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        at: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match at {
            Some(at) => serializer.serialize_f64(super::to_epoch_seconds(*at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(seconds) => super::from_epoch_seconds(seconds)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {seconds}"))),
            None => Ok(None),
        }
    }
}

/// `#[serde(with = "tag_set")]` for `BTreeSet<String>`.
///
/// Serializes an empty set as `{}` and a non-empty set as a sorted array.
/// Accepts either shape when reading.
pub mod tag_set {
    use std::collections::BTreeSet;
    use std::fmt;

    use serde::de::{MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tags: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        if tags.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }
        let mut seq = serializer.serialize_seq(Some(tags.len()))?;
        for tag in tags {
            seq.serialize_element(tag)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        deserializer.deserialize_any(TagSetVisitor)
    }

    struct TagSetVisitor;

    impl<'de> Visitor<'de> for TagSetVisitor {
        type Value = BTreeSet<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an array of tags or an empty mapping")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut tags = BTreeSet::new();
            while let Some(tag) = seq.next_element::<String>()? {
                tags.insert(tag);
            }
            Ok(tags)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            // Keys of a mapping are taken as tags; in practice this is always `{}`.
            let mut tags = BTreeSet::new();
            while let Some((tag, _)) = map.next_entry::<String, serde::de::IgnoredAny>()? {
                tags.insert(tag);
            }
            Ok(tags)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(BTreeSet::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(BTreeSet::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tagged {
        #[serde(with = "tag_set")]
        tags: BTreeSet<String>,
    }

    #[test]
    fn empty_tags_serialize_as_mapping() {
        let value = serde_json::to_value(Tagged { tags: BTreeSet::new() }).unwrap();
        assert_eq!(value, json!({ "tags": {} }));
    }

    #[test]
    fn tags_serialize_as_sorted_array() {
        let tags = ["zeta", "alpha"].into_iter().map(String::from).collect();
        let value = serde_json::to_value(Tagged { tags }).unwrap();
        assert_eq!(value, json!({ "tags": ["alpha", "zeta"] }));
    }

    #[test]
    fn tags_accept_mapping_or_array() {
        let from_map: Tagged = serde_json::from_value(json!({ "tags": {} })).unwrap();
        assert!(from_map.tags.is_empty());

        let from_array: Tagged = serde_json::from_value(json!({ "tags": ["a", "b", "a"] })).unwrap();
        assert_eq!(from_array.tags.len(), 2);
    }

    #[test]
    fn epoch_seconds_keep_microseconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let seconds = to_epoch_seconds(at);
        assert_eq!(seconds.floor(), 1_700_000_000.0);
        assert_eq!(from_epoch_seconds(seconds), Some(at));
    }

    #[test]
    fn non_finite_seconds_are_rejected() {
        assert_eq!(from_epoch_seconds(f64::NAN), None);
        assert_eq!(from_epoch_seconds(f64::INFINITY), None);
    }
}
