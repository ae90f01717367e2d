//! Codecs for date and time values.
//!
//! Binary wire forms are length-selected: DATETIME/TIMESTAMP bodies are
//! 0, 4, 7 or 11 bytes, TIME bodies 0, 8 or 12 bytes, DATE bodies 0 or
//! 4 bytes. Zero dates (`0000-00-00`) are transmitted literally by the
//! server and resolved through the context's zero-date policy before any
//! calendar value is built.

#![allow(clippy::cast_possible_truncation)]

use super::{Codec, Parameter, TargetType, overflow_error, parse_error};
use crate::context::{CodecContext, ZeroDateOption};
use crate::types::{ColumnDef, MySqlType};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use flowsql_core::{Result, Value};

const MICROS_PER_SECOND: i64 = 1_000_000;

fn is_datetime_column(column: MySqlType) -> bool {
    matches!(column, MySqlType::DateTime | MySqlType::Timestamp)
}

#[allow(clippy::result_large_err)]
fn zero_date<T>(ctx: &CodecContext, round: T) -> Result<Option<T>> {
    match ctx.zero_date {
        ZeroDateOption::UseNull => Ok(None),
        ZeroDateOption::UseRound => Ok(Some(round)),
        ZeroDateOption::Exception => Err(parse_error("calendar value", b"0000-00-00")),
    }
}

fn round_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).expect("0001-01-01")
}

/// Decode a DATE payload; `None` means a zero date mapped to NULL.
#[allow(clippy::result_large_err)]
fn decode_date(payload: &[u8], binary: bool, ctx: &CodecContext) -> Result<Option<NaiveDate>> {
    if binary {
        return match payload.len() {
            0 => zero_date(ctx, round_date()),
            len if len >= 4 => {
                let year = u16::from_le_bytes([payload[0], payload[1]]);
                let month = payload[2];
                let day = payload[3];
                build_date(ctx, i32::from(year), u32::from(month), u32::from(day))
            }
            _ => Err(parse_error("DATE", payload)),
        };
    }

    let text = std::str::from_utf8(payload).map_err(|_| parse_error("DATE", payload))?;
    let (year, month, day) = parse_date_text(text)?;
    build_date(ctx, year, month, day)
}

#[allow(clippy::result_large_err)]
fn build_date(ctx: &CodecContext, year: i32, month: u32, day: u32) -> Result<Option<NaiveDate>> {
    if year == 0 && month == 0 && day == 0 {
        return zero_date(ctx, round_date());
    }
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Ok(Some(date)),
        None => Err(parse_error("DATE", format!("{year:04}-{month:02}-{day:02}").as_bytes())),
    }
}

#[allow(clippy::result_large_err)]
fn parse_date_text(text: &str) -> Result<(i32, u32, u32)> {
    let mut parts = text.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse().ok());
    let month = parts.next().and_then(|p| p.parse().ok());
    let day = parts.next().and_then(|p| p.parse().ok());
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => Ok((y, m, d)),
        _ => Err(parse_error("DATE", text.as_bytes())),
    }
}

/// Decode a DATETIME/TIMESTAMP payload; `None` means a zero date.
#[allow(clippy::result_large_err)]
pub(super) fn decode_datetime(
    payload: &[u8],
    binary: bool,
    ctx: &CodecContext,
) -> Result<Option<NaiveDateTime>> {
    let round = round_date().and_hms_opt(0, 0, 0).expect("midnight");

    if binary {
        return match payload.len() {
            0 => zero_date(ctx, round),
            4 => Ok(decode_date(payload, true, ctx)?.map(|d| d.and_hms_opt(0, 0, 0).expect("midnight"))),
            len if len >= 7 => {
                let date = match decode_date(payload, true, ctx)? {
                    Some(date) => date,
                    None => return Ok(None),
                };
                let micros = if len >= 11 {
                    u32::from_le_bytes([payload[7], payload[8], payload[9], payload[10]])
                } else {
                    0
                };
                let time = NaiveTime::from_hms_micro_opt(
                    u32::from(payload[4]),
                    u32::from(payload[5]),
                    u32::from(payload[6]),
                    micros,
                )
                .ok_or_else(|| parse_error("DATETIME", payload))?;
                Ok(Some(date.and_time(time)))
            }
            _ => Err(parse_error("DATETIME", payload)),
        };
    }

    let text = std::str::from_utf8(payload).map_err(|_| parse_error("DATETIME", payload))?;
    let (date_text, time_text) = match text.split_once(' ') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };

    let (year, month, day) = parse_date_text(date_text)?;
    if year == 0 && month == 0 && day == 0 {
        return zero_date(ctx, round);
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| parse_error("DATETIME", payload))?;
    let time = match time_text {
        Some(t) => parse_time_text(t).ok_or_else(|| parse_error("DATETIME", payload))?,
        None => NaiveTime::MIN,
    };
    Ok(Some(date.and_time(time)))
}

/// Parse `HH:MM:SS[.ffffff]`, tolerating short fractions.
fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match text.split_once('.') {
        Some((clock, frac)) => (clock, Some(frac)),
        None => (text, None),
    };

    let mut parts = clock.splitn(3, ':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next().unwrap_or("0").parse().ok()?;
    let micros = match fraction {
        Some(frac) => parse_micros(frac)?,
        None => 0,
    };

    NaiveTime::from_hms_micro_opt(hours, minutes, seconds, micros)
}

/// Fraction digits to microseconds, right-padded (`.5` is 500000).
fn parse_micros(fraction: &str) -> Option<u32> {
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = fraction.parse().ok()?;
    Some(value * 10u32.pow(6 - fraction.len() as u32))
}

/// Decode a TIME payload as a signed duration.
#[allow(clippy::result_large_err)]
fn decode_duration(payload: &[u8], binary: bool) -> Result<Duration> {
    if binary {
        return match payload.len() {
            0 => Ok(Duration::zero()),
            len if len >= 8 => {
                let negative = payload[0] != 0;
                let days = i64::from(u32::from_le_bytes([
                    payload[1], payload[2], payload[3], payload[4],
                ]));
                let micros = if len >= 12 {
                    i64::from(u32::from_le_bytes([
                        payload[8], payload[9], payload[10], payload[11],
                    ]))
                } else {
                    0
                };
                let seconds = days * 86_400
                    + i64::from(payload[5]) * 3_600
                    + i64::from(payload[6]) * 60
                    + i64::from(payload[7]);
                let total = seconds * MICROS_PER_SECOND + micros;
                Ok(Duration::microseconds(if negative { -total } else { total }))
            }
            _ => Err(parse_error("TIME", payload)),
        };
    }

    let text = std::str::from_utf8(payload).map_err(|_| parse_error("TIME", payload))?;
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (clock, fraction) = match rest.split_once('.') {
        Some((clock, frac)) => (clock, Some(frac)),
        None => (rest, None),
    };
    let mut parts = clock.splitn(3, ':');
    let hours: i64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| parse_error("TIME", payload))?;
    let minutes: i64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| parse_error("TIME", payload))?;
    let seconds: i64 = parts.next().unwrap_or("0").parse().map_err(|_| parse_error("TIME", payload))?;
    let micros = match fraction {
        Some(frac) => i64::from(parse_micros(frac).ok_or_else(|| parse_error("TIME", payload))?),
        None => 0,
    };

    let total = (hours * 3_600 + minutes * 60 + seconds) * MICROS_PER_SECOND + micros;
    Ok(Duration::microseconds(if negative { -total } else { total }))
}

/// Binary DATE body with its length prefix.
fn encode_date_binary(date: NaiveDate) -> Vec<u8> {
    use chrono::Datelike;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let year = date.year() as u16;
    let mut body = Vec::with_capacity(5);
    body.push(4);
    body.extend_from_slice(&year.to_le_bytes());
    body.push(date.month() as u8);
    body.push(date.day() as u8);
    body
}

/// Binary DATETIME body with its length prefix (4, 7 or 11 byte form).
pub(super) fn encode_datetime_binary(dt: NaiveDateTime) -> Vec<u8> {
    use chrono::Datelike;
    let micros = dt.time().nanosecond() / 1_000;
    let has_time = dt.time() != NaiveTime::MIN;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let year = (dt.year() as u16).to_le_bytes();
    let mut body = Vec::with_capacity(12);

    if micros != 0 {
        body.push(11);
    } else if has_time {
        body.push(7);
    } else {
        body.push(4);
    }
    body.extend_from_slice(&year);
    body.push(dt.month() as u8);
    body.push(dt.day() as u8);
    if has_time || micros != 0 {
        body.push(dt.hour() as u8);
        body.push(dt.minute() as u8);
        body.push(dt.second() as u8);
    }
    if micros != 0 {
        body.extend_from_slice(&micros.to_le_bytes());
    }
    body
}

/// Binary TIME body with its length prefix (0, 8 or 12 byte form).
fn encode_duration_binary(duration: Duration) -> Vec<u8> {
    let negative = duration < Duration::zero();
    let total_micros = duration.num_microseconds().unwrap_or(0).unsigned_abs();
    let micros = (total_micros % MICROS_PER_SECOND as u64) as u32;
    let total_seconds = total_micros / MICROS_PER_SECOND as u64;

    if total_micros == 0 {
        return vec![0];
    }

    let days = (total_seconds / 86_400) as u32;
    let hours = ((total_seconds % 86_400) / 3_600) as u8;
    let minutes = ((total_seconds % 3_600) / 60) as u8;
    let seconds = (total_seconds % 60) as u8;

    let mut body = Vec::with_capacity(13);
    body.push(if micros != 0 { 12 } else { 8 });
    body.push(u8::from(negative));
    body.extend_from_slice(&days.to_le_bytes());
    body.push(hours);
    body.push(minutes);
    body.push(seconds);
    if micros != 0 {
        body.extend_from_slice(&micros.to_le_bytes());
    }
    body
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(super) fn format_datetime(dt: NaiveDateTime) -> String {
    let micros = dt.time().nanosecond() / 1_000;
    if micros != 0 {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn format_duration(duration: Duration) -> String {
    let total_micros = duration.num_microseconds().unwrap_or(0);
    let sign = if total_micros < 0 { "-" } else { "" };
    let total_micros = total_micros.unsigned_abs();
    let micros = total_micros % MICROS_PER_SECOND as u64;
    let total_seconds = total_micros / MICROS_PER_SECOND as u64;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if micros != 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    }
}

fn quoted(literal: String) -> String {
    format!("'{literal}'")
}

/// Codec for YEAR values.
pub(super) struct YearCodec;

impl Codec for YearCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Year && (column == MySqlType::Year || column.is_integer())
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        let wide = super::integers::decode_i64(payload, column, binary)?;
        let year = i16::try_from(wide).map_err(|_| overflow_error("YEAR", wide))?;
        Ok(Value::Year(year))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Year(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Year(year) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Year,
            year.to_le_bytes().to_vec(),
            year.to_string(),
        ))
    }
}

/// Codec for calendar dates.
pub(super) struct DateCodec;

impl Codec for DateCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Date && (column == MySqlType::Date || is_datetime_column(column))
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        let date = if column.mysql_type() == MySqlType::Date {
            decode_date(payload, binary, ctx)?
        } else {
            decode_datetime(payload, binary, ctx)?.map(|dt| dt.date())
        };
        Ok(date.map_or(Value::Null, Value::Date))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Date(date) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Date,
            encode_date_binary(*date),
            quoted(format_date(*date)),
        ))
    }
}

/// Codec for times of day. Values outside one day wrap around the clock.
pub(super) struct TimeCodec;

impl Codec for TimeCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Time && (column == MySqlType::Time || is_datetime_column(column))
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        if column.mysql_type() != MySqlType::Time {
            return Ok(decode_datetime(payload, binary, ctx)?
                .map_or(Value::Null, |dt| Value::Time(dt.time())));
        }

        let duration = decode_duration(payload, binary)?;
        let day = 86_400 * MICROS_PER_SECOND;
        let micros = duration.num_microseconds().unwrap_or(0).rem_euclid(day);
        let time = NaiveTime::from_num_seconds_from_midnight_opt(
            (micros / MICROS_PER_SECOND) as u32,
            ((micros % MICROS_PER_SECOND) * 1_000) as u32,
        )
        .ok_or_else(|| parse_error("TIME", payload))?;
        Ok(Value::Time(time))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Time(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Time(time) = value else { unreachable!() };
        let duration = time.signed_duration_since(NaiveTime::MIN);
        Ok(Parameter::new(
            MySqlType::Time,
            encode_duration_binary(duration),
            quoted(format_duration(duration)),
        ))
    }
}

/// Codec for signed elapsed times, the full range of MySQL TIME.
pub(super) struct DurationCodec;

impl Codec for DurationCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Duration && column == MySqlType::Time
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        _ctx: &CodecContext,
    ) -> Result<Value> {
        Ok(Value::Duration(decode_duration(payload, binary)?))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Duration(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::Duration(duration) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::Time,
            encode_duration_binary(*duration),
            quoted(format_duration(*duration)),
        ))
    }
}

/// Codec for naive date-times.
pub(super) struct DateTimeCodec;

impl Codec for DateTimeCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::DateTime
            && (is_datetime_column(column) || column == MySqlType::Date)
    }

    fn decode(
        &self,
        payload: &[u8],
        column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        if column.mysql_type() == MySqlType::Date {
            return Ok(decode_date(payload, binary, ctx)?.map_or(Value::Null, |d| {
                Value::DateTime(d.and_hms_opt(0, 0, 0).expect("midnight"))
            }));
        }
        Ok(decode_datetime(payload, binary, ctx)?.map_or(Value::Null, Value::DateTime))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::DateTime(_))
    }

    fn encode(&self, value: &Value, _ctx: &CodecContext) -> Result<Parameter> {
        let Value::DateTime(dt) = value else { unreachable!() };
        Ok(Parameter::new(
            MySqlType::DateTime,
            encode_datetime_binary(*dt),
            quoted(format_datetime(*dt)),
        ))
    }
}

/// Codec for zoned and offset date-times.
///
/// A naive server value is read first, then the zone: when the configured
/// zone is a fixed offset it is attached directly, otherwise the zone's
/// offset at that local instant is resolved.
pub(super) struct OffsetDateTimeCodec;

impl Codec for OffsetDateTimeCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        matches!(target, TargetType::Zoned | TargetType::Offset) && is_datetime_column(column)
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        let Some(local) = decode_datetime(payload, binary, ctx)? else {
            return Ok(Value::Null);
        };

        let zone = ctx.instant_zone();
        let offset = zone.offset_at(local);
        let value = local
            .and_local_timezone(offset)
            .single()
            .ok_or_else(|| parse_error("TIMESTAMP", payload))?;
        Ok(Value::OffsetDateTime(value))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::OffsetDateTime(_))
    }

    fn encode(&self, value: &Value, ctx: &CodecContext) -> Result<Parameter> {
        let Value::OffsetDateTime(v) = value else { unreachable!() };
        // Same instant, expressed on the server's clock.
        let local = ctx.instant_zone().local_from_utc(v.with_timezone(&Utc));
        Ok(Parameter::new(
            MySqlType::Timestamp,
            encode_datetime_binary(local),
            quoted(format_datetime(local)),
        ))
    }
}

/// Codec for absolute instants.
pub(super) struct InstantCodec;

impl Codec for InstantCodec {
    fn can_decode(&self, column: MySqlType, target: TargetType) -> bool {
        target == TargetType::Instant && is_datetime_column(column)
    }

    fn decode(
        &self,
        payload: &[u8],
        _column: &ColumnDef,
        _target: TargetType,
        binary: bool,
        ctx: &CodecContext,
    ) -> Result<Value> {
        let Some(local) = decode_datetime(payload, binary, ctx)? else {
            return Ok(Value::Null);
        };

        let offset = ctx.instant_zone().offset_at(local);
        let value = local
            .and_local_timezone(offset)
            .single()
            .ok_or_else(|| parse_error("TIMESTAMP", payload))?;
        Ok(Value::Instant(value.with_timezone(&Utc)))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Instant(_))
    }

    fn encode(&self, value: &Value, ctx: &CodecContext) -> Result<Parameter> {
        let Value::Instant(v) = value else { unreachable!() };
        let local = ctx.instant_zone().local_from_utc(*v);
        Ok(Parameter::new(
            MySqlType::Timestamp,
            encode_datetime_binary(local),
            quoted(format_datetime(local)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{column, context, context_with_zero_date, context_with_zone};
    use super::super::Codecs;
    use super::*;
    use crate::types::FieldType;
    use crate::zone::parse_zone;
    use chrono::FixedOffset;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_micro_opt(h, mi, s, micro)
            .unwrap()
    }

    #[test]
    fn datetime_binary_known_vector() {
        // 2021-05-03 15:02:07.123456 in the 11-byte form.
        let expected = [
            0x0B, 0xE5, 0x07, 0x05, 0x03, 0x0F, 0x02, 0x07, 0x40, 0xE2, 0x01, 0x00,
        ];
        let value = dt(2021, 5, 3, 15, 2, 7, 123_456);
        assert_eq!(encode_datetime_binary(value), expected);

        // The body (without length prefix) decodes back.
        let ctx = context();
        let decoded = decode_datetime(&expected[1..], true, &ctx).unwrap();
        assert_eq!(decoded, Some(value));
    }

    #[test]
    fn datetime_binary_length_forms() {
        let date_only = dt(2021, 5, 3, 0, 0, 0, 0);
        assert_eq!(encode_datetime_binary(date_only)[0], 4);

        let seconds = dt(2021, 5, 3, 15, 2, 7, 0);
        assert_eq!(encode_datetime_binary(seconds)[0], 7);

        let ctx = context();
        assert_eq!(
            decode_datetime(&encode_datetime_binary(seconds)[1..], true, &ctx).unwrap(),
            Some(seconds)
        );
        assert_eq!(
            decode_datetime(&encode_datetime_binary(date_only)[1..], true, &ctx).unwrap(),
            Some(date_only)
        );
    }

    #[test]
    fn datetime_text_tolerates_fractions() {
        let ctx = context();
        assert_eq!(
            decode_datetime(b"2021-05-03 15:02:07", false, &ctx).unwrap(),
            Some(dt(2021, 5, 3, 15, 2, 7, 0))
        );
        assert_eq!(
            decode_datetime(b"2021-05-03 15:02:07.5", false, &ctx).unwrap(),
            Some(dt(2021, 5, 3, 15, 2, 7, 500_000))
        );
        assert_eq!(
            decode_datetime(b"2021-05-03 15:02:07.123456", false, &ctx).unwrap(),
            Some(dt(2021, 5, 3, 15, 2, 7, 123_456))
        );
        assert!(decode_datetime(b"2021-13-03 15:02:07", false, &ctx).is_err());
    }

    #[test]
    fn zero_date_policies() {
        let ctx = context_with_zero_date(ZeroDateOption::UseNull);
        assert_eq!(decode_datetime(b"0000-00-00 00:00:00", false, &ctx).unwrap(), None);
        assert_eq!(decode_datetime(&[], true, &ctx).unwrap(), None);

        let ctx = context_with_zero_date(ZeroDateOption::UseRound);
        assert_eq!(
            decode_datetime(b"0000-00-00 00:00:00", false, &ctx).unwrap(),
            Some(dt(1, 1, 1, 0, 0, 0, 0))
        );

        let ctx = context_with_zero_date(ZeroDateOption::Exception);
        assert!(decode_datetime(b"0000-00-00 00:00:00", false, &ctx).is_err());
    }

    #[test]
    fn duration_binary_roundtrip() {
        let negative = Duration::microseconds(-((26 * 3600 + 30 * 60 + 5) * 1_000_000 + 250_000));
        let body = encode_duration_binary(negative);
        assert_eq!(body[0], 12);
        assert_eq!(body[1], 1); // sign
        assert_eq!(decode_duration(&body[1..], true).unwrap(), negative);

        let plain = Duration::seconds(3 * 3600 + 25 * 60 + 17);
        let body = encode_duration_binary(plain);
        assert_eq!(body[0], 8);
        assert_eq!(decode_duration(&body[1..], true).unwrap(), plain);

        assert_eq!(encode_duration_binary(Duration::zero()), vec![0]);
        assert_eq!(decode_duration(&[], true).unwrap(), Duration::zero());
    }

    #[test]
    fn duration_text_forms() {
        assert_eq!(
            decode_duration(b"123:45:06", false).unwrap(),
            Duration::seconds(123 * 3600 + 45 * 60 + 6)
        );
        assert_eq!(
            decode_duration(b"-00:00:01.5", false).unwrap(),
            Duration::microseconds(-1_500_000)
        );
        assert_eq!(
            format_duration(Duration::seconds(123 * 3600 + 45 * 60 + 6)),
            "123:45:06"
        );
        assert_eq!(
            format_duration(Duration::microseconds(-1_500_000)),
            "-00:00:01.500000"
        );
    }

    #[test]
    fn time_wraps_into_one_day() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Time, false);

        // 26:00:00 wraps to 02:00:00.
        let v = codecs
            .decode(Some(b"26:00:00"), &col, TargetType::Time, false, &ctx)
            .unwrap();
        assert_eq!(
            v,
            Value::Time(NaiveTime::from_hms_opt(2, 0, 0).unwrap())
        );

        // -01:00:00 wraps to 23:00:00.
        let v = codecs
            .decode(Some(b"-01:00:00"), &col, TargetType::Time, false, &ctx)
            .unwrap();
        assert_eq!(
            v,
            Value::Time(NaiveTime::from_hms_opt(23, 0, 0).unwrap())
        );
    }

    #[test]
    fn date_codec_roundtrip() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Date, false);

        let date = NaiveDate::from_ymd_opt(2021, 5, 3).unwrap();
        let param = codecs.encode(&Value::Date(date), &ctx).unwrap();
        assert_eq!(param.binary_bytes(), &[4, 0xE5, 0x07, 5, 3]);
        assert_eq!(param.text_literal(), "'2021-05-03'");

        let v = codecs
            .decode(Some(&param.binary_bytes()[1..]), &col, TargetType::Date, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Date(date));

        let v = codecs
            .decode(Some(b"2021-05-03"), &col, TargetType::Date, false, &ctx)
            .unwrap();
        assert_eq!(v, Value::Date(date));
    }

    #[test]
    fn zoned_decode_attaches_server_zone_offset() {
        let codecs = Codecs::default();
        let ctx = context_with_zone(parse_zone("+08:00"));
        let col = column(FieldType::Timestamp, false);

        let v = codecs
            .decode(
                Some(b"2021-05-03 15:02:07"),
                &col,
                TargetType::Zoned,
                false,
                &ctx,
            )
            .unwrap();

        let expected = dt(2021, 5, 3, 15, 2, 7, 0)
            .and_local_timezone(FixedOffset::east_opt(8 * 3600).unwrap())
            .unwrap();
        assert_eq!(v, Value::OffsetDateTime(expected));
    }

    #[test]
    fn zoned_encode_converts_to_server_clock() {
        let codecs = Codecs::default();
        let ctx = context_with_zone(parse_zone("+08:00"));

        // 12:00 UTC is 20:00 on a +08:00 server.
        let value = dt(2021, 5, 3, 12, 0, 0, 0)
            .and_local_timezone(FixedOffset::east_opt(0).unwrap())
            .unwrap();
        let param = codecs.encode(&Value::OffsetDateTime(value), &ctx).unwrap();
        assert_eq!(param.text_literal(), "'2021-05-03 20:00:00'");
    }

    #[test]
    fn instant_roundtrip_through_named_zone() {
        let codecs = Codecs::default();
        let ctx = context_with_zone(parse_zone("Europe/Berlin"));
        let col = column(FieldType::Timestamp, false);

        // Summer time: UTC+2.
        let instant = dt(2021, 7, 15, 10, 0, 0, 0).and_utc();
        let param = codecs.encode(&Value::Instant(instant), &ctx).unwrap();
        assert_eq!(param.text_literal(), "'2021-07-15 12:00:00'");

        let v = codecs
            .decode(
                Some(b"2021-07-15 12:00:00"),
                &col,
                TargetType::Instant,
                false,
                &ctx,
            )
            .unwrap();
        assert_eq!(v, Value::Instant(instant));
    }

    #[test]
    fn year_codec() {
        let codecs = Codecs::default();
        let ctx = context();
        let col = column(FieldType::Year, false);

        let v = codecs
            .decode(Some(&2021i16.to_le_bytes()), &col, TargetType::Year, true, &ctx)
            .unwrap();
        assert_eq!(v, Value::Year(2021));

        let param = codecs.encode(&Value::Year(2021), &ctx).unwrap();
        assert_eq!(param.binary_bytes(), &2021i16.to_le_bytes());
        assert_eq!(param.text_literal(), "2021");
    }
}
