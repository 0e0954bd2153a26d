//! Purpose: Closed cell value model shared by codec, stores, and diffing.
//! Exports: `Value`, timestamp encode/decode helpers, `now_ms`, `cells_equal`.
//! Role: Single seam for cell typing so callsites avoid ad hoc tag dispatch.
//! Invariants: Persisted timestamps are ISO-8601 with exactly millisecond precision.
//! Invariants: Only timestamp-shaped text decodes to `Timestamp`; all other text stays text.

use crate::core::error::{Error, ErrorKind};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// One cell of a row. Stores only ever hold `Null`/`Bool`/`Number`/`Text`;
/// `Timestamp` exists on the record side and is encoded to text on write.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(OffsetDateTime),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Persisted form of this value: timestamps become their ISO-8601 text,
    /// everything else passes through unchanged.
    pub fn encode_cell(&self) -> Result<Self, Error> {
        match self {
            Self::Timestamp(ts) => Ok(Self::Text(format_timestamp(*ts)?)),
            other => Ok(other.clone()),
        }
    }

    /// Read-side decode: timestamp-shaped text becomes `Timestamp`.
    pub fn decode_cell(self) -> Self {
        if let Self::Text(text) = &self {
            if is_timestamp_text(text) {
                if let Ok(ts) = OffsetDateTime::parse(text, &Rfc3339) {
                    return Self::Timestamp(ts);
                }
            }
        }
        self
    }

    /// Rendering used for header names, diff equality on non-scalar variants,
    /// and blank-cell semantics (`Null` renders empty, like a spreadsheet cell).
    pub fn display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Timestamp(ts) => format_timestamp(*ts).unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(ts) => match format_timestamp(*ts) {
                Ok(text) => serde_json::Value::String(text),
                Err(_) => serde_json::Value::Null,
            },
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, Error> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).ok_or_else(|| {
                Error::new(ErrorKind::Store).with_message("cell number out of range")
            }),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(Error::new(ErrorKind::Store).with_message("nested cell values are unsupported"))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// Diff equality policy: scalar variants compare strictly within their own
/// variant; timestamps and nulls compare by display string, which also lets a
/// timestamp match its own encoded text form.
pub fn cells_equal(a: &Value, b: &Value) -> bool {
    match a {
        Value::Number(_) | Value::Text(_) | Value::Bool(_) => a == b,
        Value::Timestamp(_) | Value::Null => a.display_string() == b.display_string(),
    }
}

const TIMESTAMP_FORMAT: &'static [time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Encode as `YYYY-MM-DDTHH:mm:ss.sssZ`, always in UTC.
pub fn format_timestamp(ts: OffsetDateTime) -> Result<String, Error> {
    ts.to_offset(time::UtcOffset::UTC)
        .format(&TIMESTAMP_FORMAT)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("timestamp format failed")
                .with_source(err)
        })
}

/// Current UTC time truncated to millisecond precision, so `updated_at` and
/// `created_at` round-trip exactly through their persisted text form.
pub fn now_ms() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let sub_ms = now.nanosecond() % 1_000_000;
    now - time::Duration::nanoseconds(i64::from(sub_ms))
}

/// Exact shape check for `YYYY-MM-DDTHH:mm:ss.sss(Z|+HH:mm|-HH:mm)`.
/// Stricter than RFC 3339 parsing: exactly three subsecond digits.
pub fn is_timestamp_text(text: &str) -> bool {
    let b = text.as_bytes();
    if b.len() != 24 && b.len() != 29 {
        return false;
    }
    let digits = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15, 17, 18, 20, 21, 22];
    if digits.iter().any(|&i| !b[i].is_ascii_digit()) {
        return false;
    }
    if b[4] != b'-' || b[7] != b'-' || b[10] != b'T' {
        return false;
    }
    if b[13] != b':' || b[16] != b':' || b[19] != b'.' {
        return false;
    }
    if b.len() == 24 {
        return b[23] == b'Z';
    }
    (b[23] == b'+' || b[23] == b'-')
        && b[24].is_ascii_digit()
        && b[25].is_ascii_digit()
        && b[26] == b':'
        && b[27].is_ascii_digit()
        && b[28].is_ascii_digit()
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, cells_equal, format_timestamp, is_timestamp_text, now_ms};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    fn ts(text: &str) -> OffsetDateTime {
        OffsetDateTime::parse(text, &Rfc3339).expect("parse")
    }

    #[test]
    fn timestamp_shape_matrix() {
        assert!(is_timestamp_text("2024-01-02T03:04:05.678Z"));
        assert!(is_timestamp_text("2024-01-02T03:04:05.678+09:00"));
        assert!(is_timestamp_text("2024-01-02T03:04:05.678-05:30"));

        assert!(!is_timestamp_text("2024-01-02T03:04:05Z"));
        assert!(!is_timestamp_text("2024-01-02T03:04:05.6789Z"));
        assert!(!is_timestamp_text("2024-01-02 03:04:05.678Z"));
        assert!(!is_timestamp_text("2024-01-02T03:04:05.678"));
        assert!(!is_timestamp_text("2024-01-02T03:04:05.678+0900"));
        assert!(!is_timestamp_text("not a timestamp"));
        assert!(!is_timestamp_text(""));
    }

    #[test]
    fn format_is_utc_milliseconds() {
        let formatted = format_timestamp(ts("2024-01-02T12:04:05.678+09:00")).expect("format");
        assert_eq!(formatted, "2024-01-02T03:04:05.678Z");
        assert!(is_timestamp_text(&formatted));
    }

    #[test]
    fn decode_cell_round_trips_encoded_timestamp() {
        let original = Value::Timestamp(ts("2024-01-02T03:04:05.678Z"));
        let stored = original.encode_cell().expect("encode");
        assert!(matches!(stored, Value::Text(_)));
        assert_eq!(stored.decode_cell(), original);
    }

    #[test]
    fn decode_cell_leaves_plain_text_alone() {
        let value = Value::text("hello");
        assert_eq!(value.clone().decode_cell(), value);
    }

    #[test]
    fn now_ms_survives_encode_decode() {
        let now = now_ms();
        let decoded = Value::Timestamp(now).encode_cell().expect("encode").decode_cell();
        assert_eq!(decoded, Value::Timestamp(now));
    }

    #[test]
    fn equality_policy() {
        assert!(cells_equal(&Value::Number(3.0), &Value::Number(3.0)));
        assert!(!cells_equal(&Value::Number(3.0), &Value::text("3")));
        assert!(cells_equal(&Value::text("a"), &Value::text("a")));
        assert!(cells_equal(&Value::Null, &Value::Null));

        let stamp = ts("2024-01-02T03:04:05.678Z");
        assert!(cells_equal(
            &Value::Timestamp(stamp),
            &Value::text("2024-01-02T03:04:05.678Z")
        ));
        assert!(!cells_equal(
            &Value::Timestamp(stamp),
            &Value::text("2024-01-02T03:04:05.679Z")
        ));
    }

    #[test]
    fn json_round_trip_rejects_nested() {
        let cells = [
            Value::Null,
            Value::Bool(true),
            Value::Number(4.5),
            Value::text("x"),
        ];
        for cell in &cells {
            let back = Value::from_json(&cell.to_json()).expect("round trip");
            assert_eq!(&back, cell);
        }
        assert!(Value::from_json(&serde_json::json!([1, 2])).is_err());
        assert!(Value::from_json(&serde_json::json!({"a": 1})).is_err());
    }
}
