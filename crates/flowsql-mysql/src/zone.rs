//! Server time-zone resolution.
//!
//! MySQL reports its effective zone through `@@time_zone` and
//! `@@system_time_zone`. The values range from IANA names over `±HH:MM`
//! offsets to tzdata aliases (`posix/…`, `right/…`, `ROC`, `Factory`) that
//! no zone database resolves directly, so the mapping below normalises
//! them before lookup.

use chrono::{FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const ZONE_PREFIX_POSIX: &str = "posix/";
const ZONE_PREFIX_RIGHT: &str = "right/";

/// A resolved time zone: either a fixed UTC offset or a named tzdb zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneId {
    /// Fixed offset from UTC, e.g. `+08:00`.
    Offset(FixedOffset),
    /// Named zone with full DST rules, e.g. `America/Godthab`.
    Named(Tz),
}

impl ZoneId {
    /// The UTC zone.
    #[must_use]
    pub fn utc() -> Self {
        ZoneId::Offset(FixedOffset::east_opt(0).expect("zero offset"))
    }

    /// The process default zone, as a fixed offset of the current instant.
    #[must_use]
    pub fn system_default() -> Self {
        ZoneId::Offset(chrono::Local::now().offset().fix())
    }

    /// Whether this zone is a fixed offset rather than a named zone.
    #[must_use]
    pub fn is_fixed_offset(&self) -> bool {
        matches!(self, ZoneId::Offset(_))
    }

    /// Project an absolute instant onto this zone's local clock.
    #[must_use]
    pub fn local_from_utc(&self, utc: chrono::DateTime<chrono::Utc>) -> NaiveDateTime {
        match self {
            ZoneId::Offset(offset) => utc.with_timezone(offset).naive_local(),
            ZoneId::Named(tz) => utc.with_timezone(tz).naive_local(),
        }
    }

    /// Resolve the UTC offset this zone has at the given local date-time.
    ///
    /// For a gap (spring-forward) the post-transition offset is used; for
    /// an ambiguous local time the earlier offset wins.
    #[must_use]
    pub fn offset_at(&self, local: NaiveDateTime) -> FixedOffset {
        match self {
            ZoneId::Offset(offset) => *offset,
            ZoneId::Named(tz) => match tz.offset_from_local_datetime(&local) {
                LocalResult::Single(offset) | LocalResult::Ambiguous(offset, _) => offset.fix(),
                LocalResult::None => tz.offset_from_utc_datetime(&local).fix(),
            },
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneId::Offset(offset) => write!(f, "{}", offset),
            ZoneId::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Resolve the server zone from the two zone variables of the init query.
///
/// `@@time_zone` wins unless it is empty or `SYSTEM`, in which case
/// `@@system_time_zone` is consulted. When neither yields a zone the
/// process default is used with a warning.
pub fn resolve_server_zone(system_time_zone: Option<&str>, time_zone: Option<&str>) -> ZoneId {
    match time_zone {
        Some(tz) if !tz.is_empty() && !tz.eq_ignore_ascii_case("SYSTEM") => parse_zone(tz),
        _ => match system_time_zone {
            Some(tz) if !tz.is_empty() => parse_zone(tz),
            _ => {
                warn!("MySQL did not return any time zone, using the system default");
                ZoneId::system_default()
            }
        },
    }
}

/// Parse a single MySQL zone name, falling back to the process default.
pub fn parse_zone(id: &str) -> ZoneId {
    let real_id = id
        .strip_prefix(ZONE_PREFIX_POSIX)
        .or_else(|| id.strip_prefix(ZONE_PREFIX_RIGHT))
        .unwrap_or(id);

    match real_id {
        // The "Factory" placeholder zone is UTC.
        "Factory" => return ZoneId::utc(),
        // Same zone including DST, but tzdb dropped the old name.
        "America/Nuuk" => return ZoneId::Named(Tz::America__Godthab),
        // Republic of China, 1912-1949. Treated as GMT+8.
        "ROC" => {
            return ZoneId::Offset(FixedOffset::east_opt(8 * 3600).expect("+08:00"));
        }
        _ => {}
    }

    if let Some(offset) = parse_offset(real_id) {
        return ZoneId::Offset(offset);
    }

    match Tz::from_str(real_id) {
        Ok(tz) => ZoneId::Named(tz),
        Err(_) => {
            warn!(zone = id, "unknown server time zone, using the system default");
            ZoneId::system_default()
        }
    }
}

/// Parse `±H`, `±HH:MM` or `±HH:MM:SS` offset syntax.
fn parse_offset(id: &str) -> Option<FixedOffset> {
    let (sign, rest) = match id.as_bytes().first()? {
        b'+' => (1i32, &id[1..]),
        b'-' => (-1i32, &id[1..]),
        _ => return None,
    };

    let mut parts = rest.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    let seconds: i32 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || hours > 14 || minutes > 59 || seconds > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn system_falls_back_to_system_time_zone() {
        // @@time_zone = SYSTEM, @@system_time_zone = right/UTC
        let zone = resolve_server_zone(Some("right/UTC"), Some("SYSTEM"));
        assert_eq!(zone, ZoneId::Named(Tz::UTC));
    }

    #[test]
    fn named_time_zone_wins() {
        let zone = resolve_server_zone(Some("CET"), Some("Asia/Tokyo"));
        assert_eq!(zone, ZoneId::Named(Tz::Asia__Tokyo));
    }

    #[test]
    fn special_names() {
        assert_eq!(parse_zone("Factory"), ZoneId::utc());
        assert_eq!(parse_zone("America/Nuuk"), ZoneId::Named(Tz::America__Godthab));
        assert_eq!(
            parse_zone("ROC"),
            ZoneId::Offset(FixedOffset::east_opt(8 * 3600).unwrap())
        );
    }

    #[test]
    fn prefixes_are_stripped() {
        assert_eq!(parse_zone("posix/Asia/Tokyo"), ZoneId::Named(Tz::Asia__Tokyo));
        assert_eq!(parse_zone("right/UTC"), ZoneId::Named(Tz::UTC));
    }

    #[test]
    fn offsets() {
        assert_eq!(
            parse_zone("+08:00"),
            ZoneId::Offset(FixedOffset::east_opt(8 * 3600).unwrap())
        );
        assert_eq!(
            parse_zone("-05:30"),
            ZoneId::Offset(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert!(parse_offset("+15:00").is_none());
        assert!(parse_offset("08:00").is_none());
    }

    #[test]
    fn garbage_falls_back_to_system_default() {
        // Must not panic; exact value depends on the host zone.
        let zone = parse_zone("Not/A_Zone");
        assert!(zone.is_fixed_offset());
    }

    #[test]
    fn offset_resolution_with_dst() {
        let zone = parse_zone("Europe/Berlin");

        let winter = NaiveDate::from_ymd_opt(2021, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let summer = NaiveDate::from_ymd_opt(2021, 7, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        assert_eq!(
            zone.offset_at(winter),
            FixedOffset::east_opt(3600).unwrap()
        );
        assert_eq!(
            zone.offset_at(summer),
            FixedOffset::east_opt(2 * 3600).unwrap()
        );
    }
}
