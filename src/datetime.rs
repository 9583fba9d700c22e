//! Conversion between native time values and xs:dateTime

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{BindError, Result};

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// An xs:dateTime value with its timezone offset
///
/// Serializes as its lexical form, so it can be used directly as an element or
/// attribute field of a bound entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlDateTime(DateTime<FixedOffset>);

impl XmlDateTime {
    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<FixedOffset> {
        self.0
    }

    /// The same instant, expressed in UTC
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl From<DateTime<FixedOffset>> for XmlDateTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        XmlDateTime(value)
    }
}

impl From<DateTime<Utc>> for XmlDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        XmlDateTime(value.fixed_offset())
    }
}

impl FromStr for XmlDateTime {
    type Err = BindError;

    /// Parse an xs:dateTime; a value without timezone is taken as UTC
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Err(BindError::invalid_argument(
                "XML date/time value should not be empty!",
            ));
        }

        if let Ok(value) = DateTime::parse_from_rfc3339(text) {
            return Ok(XmlDateTime(value));
        }

        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| XmlDateTime(naive.and_utc().fixed_offset()))
            .map_err(|e| {
                BindError::invalid_argument(format!(
                    "'{}' is not a valid XML date/time: {}",
                    text, e
                ))
            })
    }
}

impl fmt::Display for XmlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for XmlDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for XmlDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Native time -> xs:dateTime, in UTC
pub fn convert_to_xml_date(time: SystemTime) -> Result<XmlDateTime> {
    let (seconds, nanos) = match time.duration_since(UNIX_EPOCH) {
        Ok(since) => (i64::try_from(since.as_secs()).ok(), since.subsec_nanos()),
        Err(before) => {
            let before = before.duration();
            let seconds = i64::try_from(before.as_secs()).ok().map(|s| -s);
            match before.subsec_nanos() {
                0 => (seconds, 0),
                n => (seconds.and_then(|s| s.checked_sub(1)), NANOS_PER_SECOND - n),
            }
        }
    };

    seconds
        .and_then(|s| DateTime::from_timestamp(s, nanos))
        .map(XmlDateTime::from)
        .ok_or_else(|| BindError::DateConversion {
            value: format!("{:?}", time),
            details: "instant is outside the representable date range".to_string(),
        })
}

/// xs:dateTime -> native time
pub fn convert_to_date(value: &XmlDateTime) -> Result<SystemTime> {
    let seconds = value.0.timestamp();
    let nanos = Duration::from_nanos(u64::from(value.0.timestamp_subsec_nanos()));

    let time = if seconds >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(seconds.unsigned_abs()))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(seconds.unsigned_abs()))
    };

    time.and_then(|t| t.checked_add(nanos))
        .ok_or_else(|| BindError::DateConversion {
            value: value.to_string(),
            details: "instant is outside the range of the system clock".to_string(),
        })
}
