//! Normalization of provider-native commit timestamps and branch refs.
//!
//! Each provider encodes commit time differently. Adapters name the format
//! they expect; anything that does not have exactly that shape is a
//! [`SourceError::Parse`], never a best-effort guess. All formats normalize
//! to whole UTC epoch seconds so equal instants compare equal regardless of
//! which provider reported them.

use chrono::{DateTime, NaiveDateTime};

use crate::error::SourceError;

/// Closed set of timestamp encodings seen across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `YYYY-MM-DD HH:MM:SS[.fraction]`, implicitly UTC (Gerrit).
    SimpleUtc,
    /// `YYYY-MM-DDTHH:MM:SSZ` (GitHub).
    IsoZ,
    /// `YYYY-MM-DDTHH:MM:SS.mmm+HH:MM` with an explicit offset (GitLab).
    IsoOffsetWithMillis,
}

impl TimestampFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampFormat::SimpleUtc => "simple-utc",
            TimestampFormat::IsoZ => "iso-z",
            TimestampFormat::IsoOffsetWithMillis => "iso-offset-millis",
        }
    }

    /// Parse `raw` into UTC epoch seconds. Sub-second precision is dropped.
    pub fn parse(&self, raw: &str) -> Result<f64, SourceError> {
        let raw = raw.trim();
        let secs = match self {
            TimestampFormat::SimpleUtc => parse_simple_utc(raw),
            TimestampFormat::IsoZ => parse_iso_z(raw),
            TimestampFormat::IsoOffsetWithMillis => parse_iso_offset_millis(raw),
        };
        secs.map(|s| s as f64).ok_or_else(|| {
            SourceError::parse(
                format!("timestamp {}", self.as_str()),
                format!("unrecognized timestamp '{raw}'"),
            )
        })
    }
}

fn parse_simple_utc(raw: &str) -> Option<i64> {
    let dt = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Some(dt.and_utc().timestamp())
}

fn parse_iso_z(raw: &str) -> Option<i64> {
    let dt = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ").ok()?;
    Some(dt.and_utc().timestamp())
}

fn parse_iso_offset_millis(raw: &str) -> Option<i64> {
    let stripped = strip_millis(raw)?;
    let dt = DateTime::parse_from_str(&stripped, "%Y-%m-%dT%H:%M:%S%:z").ok()?;
    Some(dt.timestamp())
}

/// `2014-12-16T08:45:45.000+08:00` -> `2014-12-16T08:45:45+08:00`.
///
/// The fraction must be exactly three digits followed by a signed offset.
fn strip_millis(raw: &str) -> Option<String> {
    const DATE_TIME_LEN: usize = "YYYY-MM-DDTHH:MM:SS".len();

    let head = raw.get(..DATE_TIME_LEN)?;
    let rest = raw.get(DATE_TIME_LEN..)?.strip_prefix('.')?;
    let millis = rest.get(..3)?;
    let offset = rest.get(3..)?;

    if !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !(offset.starts_with('+') || offset.starts_with('-')) {
        return None;
    }
    Some(format!("{head}{offset}"))
}

/// Normalize a raw ref into a branch key.
///
/// `refs/heads/feature/x` -> `feature/x`; the `HEAD` pseudo-ref yields `None`.
/// Other names pass through unchanged.
pub fn branch_key(raw_ref: &str) -> Option<String> {
    let raw_ref = raw_ref.trim();
    if raw_ref == "HEAD" || raw_ref.is_empty() {
        return None;
    }
    Some(
        raw_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(raw_ref)
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2016-04-01T06:43:07Z
    const EXPECTED: f64 = 1_459_492_987.0;

    #[test]
    fn simple_utc_with_and_without_fraction() {
        let f = TimestampFormat::SimpleUtc;
        assert_eq!(f.parse("2016-04-01 06:43:07.000000").unwrap(), EXPECTED);
        assert_eq!(f.parse("2016-04-01 06:43:07.000000000").unwrap(), EXPECTED);
        assert_eq!(f.parse("2016-04-01 06:43:07").unwrap(), EXPECTED);
        // fraction is dropped, not rounded
        assert_eq!(f.parse("2016-04-01 06:43:07.999").unwrap(), EXPECTED);
    }

    #[test]
    fn iso_z() {
        let f = TimestampFormat::IsoZ;
        assert_eq!(f.parse("2016-04-01T06:43:07Z").unwrap(), EXPECTED);
    }

    #[test]
    fn iso_offset_with_millis_applies_offset() {
        let f = TimestampFormat::IsoOffsetWithMillis;
        assert_eq!(f.parse("2016-04-01T06:43:07.000+00:00").unwrap(), EXPECTED);
        assert_eq!(f.parse("2016-04-01T14:43:07.000+08:00").unwrap(), EXPECTED);
        assert_eq!(f.parse("2016-03-31T23:43:07.123-07:00").unwrap(), EXPECTED);
    }

    #[test]
    fn all_three_encodings_agree() {
        let a = TimestampFormat::IsoZ.parse("2016-04-01T06:43:07Z").unwrap();
        let b = TimestampFormat::SimpleUtc
            .parse("2016-04-01 06:43:07.000000")
            .unwrap();
        let c = TimestampFormat::IsoOffsetWithMillis
            .parse("2016-04-01T06:43:07.000+00:00")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        assert!(TimestampFormat::SimpleUtc
            .parse("2016-04-01T06:43:07Z")
            .is_err());
        assert!(TimestampFormat::IsoZ
            .parse("2016-04-01T06:43:07.000+00:00")
            .is_err());
        assert!(TimestampFormat::IsoZ.parse("2016-04-01 06:43:07").is_err());
        assert!(TimestampFormat::IsoOffsetWithMillis
            .parse("2016-04-01T06:43:07Z")
            .is_err());
        assert!(TimestampFormat::IsoOffsetWithMillis
            .parse("2016-04-01T06:43:07+08:00")
            .is_err());
        assert!(TimestampFormat::IsoOffsetWithMillis
            .parse("2016-04-01T06:43:07.0+08:00")
            .is_err());
        assert!(TimestampFormat::SimpleUtc.parse("yesterday").is_err());
    }

    #[test]
    fn parse_error_mentions_raw_value() {
        let err = TimestampFormat::IsoZ.parse("nope").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn branch_key_strips_heads_prefix() {
        assert_eq!(
            branch_key("refs/heads/feature/x").as_deref(),
            Some("feature/x")
        );
        assert_eq!(branch_key("refs/heads/master").as_deref(), Some("master"));
        assert_eq!(branch_key("master").as_deref(), Some("master"));
    }

    #[test]
    fn branch_key_excludes_head() {
        assert_eq!(branch_key("HEAD"), None);
    }
}
