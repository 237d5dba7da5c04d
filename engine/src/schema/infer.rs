use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{SourceRecord, SqlType, Value};

/// Characters a phone number may consist of: digits, blanks, dashes, parentheses and a
/// leading plus.
static PHONE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[+]?[\d\s\-()]+$").ok());

/// Naive formats accepted as timestamps, besides RFC 3339 and RFC 2822.
///
/// Slash-separated dates are read month first, which is how Postgres parses them by default.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

/// Database-agnostic classification of a field's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Text,
    Email,
    Phone,
    Number,
    Boolean,
    Timestamp,
    Array,
    Json,
}

impl LogicalType {
    /// Returns the Target column type used to store values of this type.
    pub fn sql_type(self) -> SqlType {
        match self {
            LogicalType::Text | LogicalType::Email | LogicalType::Phone => SqlType::Text,
            LogicalType::Number => SqlType::Numeric,
            LogicalType::Boolean => SqlType::Boolean,
            LogicalType::Timestamp => SqlType::Timestamptz,
            LogicalType::Array | LogicalType::Json => SqlType::Jsonb,
        }
    }
}

/// Infers the [`LogicalType`] of a single value.
///
/// Checks run in a fixed order and the first match wins: email, timestamp, phone, then text for
/// strings. Timestamps are checked before phone numbers since an ISO date such as `1990-01-01`
/// also consists of phone characters only.
pub fn infer(value: &Value) -> LogicalType {
    match value {
        Value::Null => LogicalType::Text,
        Value::String(value) => infer_string(value),
        Value::Number(_) => LogicalType::Number,
        Value::Bool(_) => LogicalType::Boolean,
        Value::Array(_) => LogicalType::Array,
        Value::Object(_) => LogicalType::Json,
    }
}

fn infer_string(value: &str) -> LogicalType {
    let trimmed = value.trim();

    if trimmed.contains('@') && trimmed.contains('.') {
        return LogicalType::Email;
    }

    if is_timestamp(trimmed) {
        return LogicalType::Timestamp;
    }

    if is_phone(trimmed) {
        return LogicalType::Phone;
    }

    LogicalType::Text
}

fn is_phone(value: &str) -> bool {
    let Some(pattern) = PHONE_PATTERN.as_ref() else {
        return false;
    };

    value.chars().any(|c| c.is_ascii_digit()) && pattern.is_match(value)
}

pub(crate) fn is_timestamp(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
    {
        return true;
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
        || NAIVE_DATE_FORMATS
            .iter()
            .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
}

/// A Source field observed over the sampled records of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    pub name: String,
    pub inferred_type: LogicalType,
    /// `true` if every sampled record has a non-null value for this field.
    pub required: bool,
    /// `false` if no sampled record had a non-null value, in which case the type is a guess.
    pub sampled: bool,
}

#[derive(Debug, Clone, Copy)]
enum Sample {
    Unseen,
    Seen(LogicalType),
    Conflict,
}

impl Sample {
    fn merge(self, next: LogicalType) -> Sample {
        match self {
            Sample::Unseen => Sample::Seen(next),
            Sample::Conflict => Sample::Conflict,
            Sample::Seen(current) if current == next => Sample::Seen(current),
            Sample::Seen(LogicalType::Text) => Sample::Seen(next),
            Sample::Seen(current) if next == LogicalType::Text => Sample::Seen(current),
            Sample::Seen(LogicalType::Array | LogicalType::Json)
                if matches!(next, LogicalType::Array | LogicalType::Json) =>
            {
                Sample::Seen(LogicalType::Json)
            }
            Sample::Seen(_) => Sample::Conflict,
        }
    }

    fn resolve(self) -> (LogicalType, bool) {
        match self {
            Sample::Unseen => (LogicalType::Text, false),
            Sample::Seen(inferred) => (inferred, true),
            Sample::Conflict => (LogicalType::Text, true),
        }
    }
}

/// Derives one [`SourceField`] per distinct field name found in `records`.
///
/// Fields are returned in order of first appearance. Null values do not take part in type
/// inference, and a field whose non-null samples disagree on a specific type falls back to text.
pub fn infer_source_fields(records: &[SourceRecord]) -> Vec<SourceField> {
    let mut order: Vec<&str> = Vec::new();
    let mut samples: HashMap<&str, (Sample, usize)> = HashMap::new();

    for record in records {
        for (name, value) in &record.fields {
            let entry = samples.entry(name.as_str()).or_insert_with(|| {
                order.push(name.as_str());
                (Sample::Unseen, 0)
            });

            if !value.is_null() {
                entry.0 = entry.0.merge(infer(value));
                entry.1 += 1;
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| {
            let (sample, non_null_count) = samples.get(name)?;
            let (inferred_type, sampled) = sample.resolve();

            Some(SourceField {
                name: name.to_string(),
                inferred_type,
                required: *non_null_count == records.len(),
                sampled,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    fn record(id: &str, fields: serde_json::Value) -> SourceRecord {
        let Value::Object(fields) = Value::from(fields) else {
            panic!("fields must be an object");
        };
        SourceRecord::new(id, fields)
    }

    #[test]
    fn infers_string_classes_in_order() {
        assert_eq!(infer(&Value::from("a@b.com")), LogicalType::Email);
        assert_eq!(infer(&Value::from("+82 (10) 1234-5678")), LogicalType::Phone);
        assert_eq!(infer(&Value::from("1990-01-01")), LogicalType::Timestamp);
        assert_eq!(infer(&Value::from("2024-03-01T10:00:00Z")), LogicalType::Timestamp);
        assert_eq!(infer(&Value::from("Kim Whanki")), LogicalType::Text);
        assert_eq!(infer(&Value::from("")), LogicalType::Text);
        assert_eq!(infer(&Value::from("- ( )")), LogicalType::Text);
    }

    #[test]
    fn infers_native_types() {
        assert_eq!(infer(&Value::Null), LogicalType::Text);
        assert_eq!(infer(&Value::from(3)), LogicalType::Number);
        assert_eq!(infer(&Value::from(true)), LogicalType::Boolean);
        assert_eq!(infer(&Value::Array(vec![])), LogicalType::Array);
        assert_eq!(infer(&Value::Object(BTreeMap::new())), LogicalType::Json);
    }

    #[test]
    fn logical_types_map_to_sql_types() {
        assert_eq!(LogicalType::Email.sql_type(), SqlType::Text);
        assert_eq!(LogicalType::Timestamp.sql_type(), SqlType::Timestamptz);
        assert_eq!(LogicalType::Array.sql_type(), SqlType::Jsonb);
        assert_eq!(LogicalType::Number.sql_type(), SqlType::Numeric);
    }

    #[test]
    fn human_readable_dates_are_timestamps() {
        for value in [
            "March 5, 2020",
            "Mar 5, 2020",
            "5 March 2020",
            "05/03/2020",
            "12/31/2020 18:30",
            "2020-03-05 10:00:00",
        ] {
            assert_eq!(infer(&Value::from(value)), LogicalType::Timestamp, "{value}");
        }

        assert_eq!(infer(&Value::from("31/12/2020")), LogicalType::Text);
        assert_eq!(infer(&Value::from("March madness")), LogicalType::Text);
    }

    #[test]
    fn later_samples_override_null_and_text() {
        let records = vec![
            record("rec_1", json!({"Email": null, "Notes": "hello"})),
            record("rec_2", json!({"Email": "a@b.com", "Notes": "x@y.org"})),
        ];

        let fields = infer_source_fields(&records);

        assert_eq!(
            fields,
            vec![
                SourceField {
                    name: "Email".to_string(),
                    inferred_type: LogicalType::Email,
                    required: false,
                    sampled: true,
                },
                SourceField {
                    name: "Notes".to_string(),
                    inferred_type: LogicalType::Email,
                    required: true,
                    sampled: true,
                },
            ]
        );
    }

    #[test]
    fn conflicting_samples_fall_back_to_text_regardless_of_order() {
        let forward = vec![
            record("rec_1", json!({"Year": 1990})),
            record("rec_2", json!({"Year": "a@b.com"})),
            record("rec_3", json!({"Year": "010-1234"})),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        for records in [forward, backward] {
            let fields = infer_source_fields(&records);
            assert_eq!(fields[0].inferred_type, LogicalType::Text);
        }
    }

    #[test]
    fn arrays_and_objects_merge_to_json() {
        let records = vec![
            record("rec_1", json!({"Tags": ["a"]})),
            record("rec_2", json!({"Tags": {"a": 1}})),
        ];

        assert_eq!(infer_source_fields(&records)[0].inferred_type, LogicalType::Json);
    }

    #[test]
    fn all_null_field_is_unsampled_text() {
        let records = vec![record("rec_1", json!({"Memo": null}))];

        let field = &infer_source_fields(&records)[0];
        assert_eq!(field.inferred_type, LogicalType::Text);
        assert!(!field.sampled);
        assert!(!field.required);
    }
}
