//! Datestamp formatting and parsing
//!
//! Datestamps are rendered with strftime-style patterns (`%Y_%m_%d` by
//! default) and placed either as a directory segment, as a filename prefix,
//! or both.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::format::{Item, ParseErrorKind, StrftimeItems};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::DatestampParseError;

/// Default datestamp pattern
pub const DEFAULT_DATESTAMP_FORMAT: &str = "%Y_%m_%d";

/// Separator between a datestamp prefix and the original filename
pub const FILE_PREFIX_SEPARATOR: &str = "__";

/// Where a datestamp is placed in a resolved path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatestampPlacement {
    /// Extra directory segment under the template base
    #[default]
    Dirs,
    /// `<stamp>__` prefix on the final path segment
    Files,
    /// Both of the above
    Both,
}

impl DatestampPlacement {
    pub fn in_dirs(self) -> bool {
        matches!(self, Self::Dirs | Self::Both)
    }

    pub fn in_files(self) -> bool {
        matches!(self, Self::Files | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dirs => "dirs",
            Self::Files => "files",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for DatestampPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatestampPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dirs" => Ok(Self::Dirs),
            "files" => Ok(Self::Files),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "invalid datestamp placement '{}': expected dirs, files or both",
                other
            )),
        }
    }
}

/// Render `instant` (default: now, local time) with `format`.
///
/// Never fails. A pattern chrono cannot render is returned verbatim and
/// logged at warn level.
pub fn format_datestamp(instant: Option<NaiveDateTime>, format: &str) -> String {
    let instant = instant.unwrap_or_else(|| Local::now().naive_local());
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();

    if items.iter().any(|item| matches!(item, Item::Error)) {
        tracing::warn!(format, "invalid datestamp format, using it verbatim");
        return format.to_string();
    }

    let mut rendered = String::new();
    if write!(rendered, "{}", instant.format_with_items(items.iter())).is_err() {
        tracing::warn!(format, "datestamp format cannot render a naive time, using it verbatim");
        return format.to_string();
    }
    rendered
}

/// Parse `text` with `format`.
///
/// Date-only formats yield midnight of that day.
pub fn parse_datestamp(text: &str, format: &str) -> Result<NaiveDateTime, DatestampParseError> {
    let wrap = |source| DatestampParseError {
        text: text.to_string(),
        format: format.to_string(),
        source,
    };

    match NaiveDateTime::parse_from_str(text, format) {
        Ok(parsed) => Ok(parsed),
        Err(e) if e.kind() == ParseErrorKind::NotEnough => NaiveDate::parse_from_str(text, format)
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(wrap),
        Err(e) => Err(wrap(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_format_datestamp_with_datetime() {
        let instant = dt(2024, 3, 15, 10, 30, 45);
        assert_eq!(format_datestamp(Some(instant), "%Y_%m_%d"), "2024_03_15");
        assert_eq!(format_datestamp(Some(instant), "%d.%m.%Y"), "15.03.2024");
    }

    #[test]
    fn test_format_datestamp_none_uses_now() {
        let before = Local::now().year();
        let year: i32 = format_datestamp(None, "%Y").parse().unwrap();
        let after = Local::now().year();
        assert!(year == before || year == after);
    }

    #[test]
    fn test_format_datestamp_invalid_pattern_is_verbatim() {
        let instant = dt(2024, 3, 15, 0, 0, 0);
        assert_eq!(format_datestamp(Some(instant), "%Q"), "%Q");
    }

    #[test]
    fn test_parse_datestamp_date_only() {
        let parsed = parse_datestamp("2024_03_15", "%Y_%m_%d").unwrap();
        assert_eq!(parsed, dt(2024, 3, 15, 0, 0, 0));

        let parsed = parse_datestamp("15-03-2024", "%d-%m-%Y").unwrap();
        assert_eq!(parsed, dt(2024, 3, 15, 0, 0, 0));
    }

    #[test]
    fn test_parse_datestamp_with_time() {
        let parsed = parse_datestamp("2024-03-15T10:30:45", "%Y-%m-%dT%H:%M:%S").unwrap();
        assert_eq!(parsed, dt(2024, 3, 15, 10, 30, 45));
    }

    #[test]
    fn test_parse_datestamp_invalid_reports_text() {
        let err = parse_datestamp("bad", "%Y_%m_%d").unwrap_err();
        assert_eq!(err.text, "bad");
        assert_eq!(err.format, "%Y_%m_%d");
        assert!(err.to_string().contains("Cannot parse 'bad'"));
    }

    #[test]
    fn test_parse_datestamp_separator_mismatch() {
        assert!(parse_datestamp("2024-03-15", "%Y_%m_%d").is_err());
    }

    #[test]
    fn test_placement_from_str() {
        assert_eq!("dirs".parse::<DatestampPlacement>(), Ok(DatestampPlacement::Dirs));
        assert_eq!("FILES".parse::<DatestampPlacement>(), Ok(DatestampPlacement::Files));
        assert_eq!(" both ".parse::<DatestampPlacement>(), Ok(DatestampPlacement::Both));
        assert!("none".parse::<DatestampPlacement>().is_err());
        assert!(DatestampPlacement::Both.in_dirs() && DatestampPlacement::Both.in_files());
        assert!(!DatestampPlacement::Files.in_dirs());
    }

    proptest! {
        #[test]
        fn prop_format_parse_roundtrip(
            y in 1970i32..2200, m in 1u32..=12, d in 1u32..=28,
            h in 0u32..24, min in 0u32..60, s in 0u32..60,
        ) {
            let instant = dt(y, m, d, h, min, s);
            let fmt = "%Y_%m_%d__%H%M%S";
            let text = format_datestamp(Some(instant), fmt);
            prop_assert_eq!(parse_datestamp(&text, fmt).unwrap(), instant);

            let midnight = dt(y, m, d, 0, 0, 0);
            let text = format_datestamp(Some(midnight), DEFAULT_DATESTAMP_FORMAT);
            prop_assert_eq!(parse_datestamp(&text, DEFAULT_DATESTAMP_FORMAT).unwrap(), midnight);
        }
    }
}
