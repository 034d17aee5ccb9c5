use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

/// Typed document value shared by every document-store binding.
///
/// Firestore distinguishes native timestamps from strings; JSON does not.
/// This enum keeps the distinction until the moment a document is serialized
/// for a tool response, where timestamps become ISO-8601 strings.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

pub type DocumentFields = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// JSON for tool responses. Timestamp fields are rewritten to ISO-8601
    /// strings here and nowhere else.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Double(f) => Value::from(*f),
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FieldValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            FieldValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Tool-call input data arrives as plain JSON. Nothing is coerced here;
    /// the date heuristic applies to filter values only.
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else {
                    FieldValue::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => FieldValue::Str(s.clone()),
            Value::Array(items) => {
                FieldValue::Array(items.iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Ordering used by range filters. Values of unrelated types do not
    /// compare (the filter simply never matches), except Int/Double which
    /// compare numerically.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.partial_cmp(b),
            (FieldValue::Int(a), FieldValue::Double(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Double(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Str(a), FieldValue::Str(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality with numeric widening, matching backend query semantics.
    pub fn loose_eq(&self, other: &FieldValue) -> bool {
        self.compare(other) == Some(Ordering::Equal) || self == other
    }
}

pub fn fields_from_json(data: &Map<String, Value>) -> DocumentFields {
    data.iter()
        .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
        .collect()
}

pub fn fields_to_json(fields: &DocumentFields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Parse a date-like string: RFC 3339, or a bare calendar date taken as
/// midnight UTC. Used by the filter-value coercion heuristic.
pub fn parse_date_like(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_serialize_as_iso_8601() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        assert_eq!(
            FieldValue::Timestamp(ts).to_json(),
            json!("2024-03-15T09:30:00.000Z")
        );
    }

    #[test]
    fn json_round_trip_preserves_plain_values() {
        let input = json!({
            "name": "ada",
            "age": 36,
            "score": 1.5,
            "tags": ["a", "b"],
            "nested": {"ok": true},
            "none": null
        });
        let fields = fields_from_json(input.as_object().unwrap());
        assert_eq!(fields_to_json(&fields), input);
    }

    #[test]
    fn parse_date_like_accepts_rfc3339_and_bare_dates() {
        let bare = parse_date_like("2024-01-15").unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());

        let full = parse_date_like("2024-01-15T12:00:00+02:00").unwrap();
        assert_eq!(full, Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());

        assert!(parse_date_like("not a date").is_none());
        assert!(parse_date_like("12345").is_none());
    }

    #[test]
    fn numeric_comparison_widens_int_to_double() {
        assert!(FieldValue::Int(2).loose_eq(&FieldValue::Double(2.0)));
        assert_eq!(
            FieldValue::Int(1).compare(&FieldValue::Double(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValue::Str("a".into()).compare(&FieldValue::Int(1)),
            None
        );
    }
}
