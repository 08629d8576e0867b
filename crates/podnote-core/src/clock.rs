use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current UTC time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

/// Parse an RFC 3339 timestamp. Returns `None` for anything unparseable.
pub fn parse_rfc3339(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s.trim(), &Rfc3339).ok()
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Deserialize a millisecond quantity that may have been written as a float
/// (media elements report fractional positions). Negative or non-finite
/// values are rejected; `null` reads as zero.
pub fn de_millis<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    match value {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
                .ok_or_else(|| D::Error::custom(format!("invalid millisecond value: {n}")))
        }
        other => Err(D::Error::custom(format!(
            "expected milliseconds as a number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrap {
        #[serde(deserialize_with = "de_millis")]
        ms: u64,
    }

    #[test]
    fn rfc3339_round_trip() {
        let now = now_rfc3339();
        assert!(parse_rfc3339(&now).is_some());
    }

    #[test]
    fn parses_browser_iso_strings() {
        let ts = parse_rfc3339("2024-03-01T10:20:30.123Z").unwrap();
        assert_eq!(ts.year(), 2024);
        assert!(parse_rfc3339("yesterday").is_none());
    }

    #[test]
    fn millis_accept_integer_float_and_null() {
        let w: Wrap = serde_json::from_str(r#"{"ms": 1500}"#).unwrap();
        assert_eq!(w.ms, 1500);
        let w: Wrap = serde_json::from_str(r#"{"ms": 1499.6}"#).unwrap();
        assert_eq!(w.ms, 1500);
        let w: Wrap = serde_json::from_str(r#"{"ms": null}"#).unwrap();
        assert_eq!(w.ms, 0);
        assert!(serde_json::from_str::<Wrap>(r#"{"ms": -3}"#).is_err());
        assert!(serde_json::from_str::<Wrap>(r#"{"ms": "12"}"#).is_err());
    }
}
