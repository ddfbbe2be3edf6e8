//! Durable textual encoding of composite chunk keys.
//!
//! Keys are persisted inside connector offsets as a tagged binary payload rendered as
//! lowercase hex text. This is the canonical encoding for the key fields of the
//! offset record; both sides of a restart must agree on it byte for byte.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! [version: u8 = 1] [component count: u16]
//! per component: [type tag: u8] [value bytes]
//!   bool        0x01  one byte, 0 or 1
//!   i16         0x02  2 bytes
//!   i32         0x03  4 bytes
//!   i64         0x04  8 bytes
//!   f64         0x05  8 bytes, IEEE-754 bits
//!   numeric     0x06  u32 length + decimal text
//!   string      0x07  u32 length + UTF-8 bytes
//!   bytes       0x08  u32 length + raw bytes
//!   date        0x09  i32 days from the Common Era
//!   time        0x0a  u32 seconds from midnight + u32 nanoseconds
//!   timestamp   0x0b  i64 microseconds since the Unix epoch
//!   timestamptz 0x0c  i64 microseconds since the Unix epoch, UTC
//!   uuid        0x0d  16 bytes
//! ```
//!
//! Timestamps are stored with microsecond precision; sub-microsecond fractions do not
//! survive a round trip.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};
use uuid::Uuid;

use crate::cdc_error;
use crate::conversions::{decode_hex, encode_hex};
use crate::error::{CdcResult, ErrorKind};
use crate::types::{CompositeKey, KeyValue};

const FORMAT_VERSION: u8 = 1;

const TAG_BOOL: u8 = 0x01;
const TAG_I16: u8 = 0x02;
const TAG_I32: u8 = 0x03;
const TAG_I64: u8 = 0x04;
const TAG_F64: u8 = 0x05;
const TAG_NUMERIC: u8 = 0x06;
const TAG_STRING: u8 = 0x07;
const TAG_BYTES: u8 = 0x08;
const TAG_DATE: u8 = 0x09;
const TAG_TIME: u8 = 0x0a;
const TAG_TIMESTAMP: u8 = 0x0b;
const TAG_TIMESTAMP_TZ: u8 = 0x0c;
const TAG_UUID: u8 = 0x0d;

/// Encodes a composite key into its durable hex text form.
pub fn encode_key(key: &CompositeKey) -> CdcResult<String> {
    let mut buf = BytesMut::with_capacity(3 + key.len() * 16);

    buf.put_u8(FORMAT_VERSION);
    let count = u16::try_from(key.len()).map_err(|_| {
        cdc_error!(
            ErrorKind::SerializationError,
            "Composite key has too many components to encode",
            format!("{} components exceed the format maximum", key.len())
        )
    })?;
    buf.put_u16(count);

    for value in key.values() {
        encode_value(&mut buf, value)?;
    }

    Ok(encode_hex(&buf))
}

/// Decodes the hex text form of a composite key persisted under `field`.
///
/// Exact inverse of [`encode_key`]. Malformed input fails with an error naming the
/// field and the offending text; it never silently yields a wrong key.
pub fn decode_key(field: &str, text: &str) -> CdcResult<CompositeKey> {
    decode_payload(text).map_err(|problem| {
        cdc_error!(
            ErrorKind::DeserializationError,
            "Failed to decode persisted key field",
            format!("field '{field}' with value '{text}': {problem}")
        )
    })
}

fn encode_value(buf: &mut BytesMut, value: &KeyValue) -> CdcResult<()> {
    match value {
        KeyValue::Bool(value) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(*value as u8);
        }
        KeyValue::I16(value) => {
            buf.put_u8(TAG_I16);
            buf.put_i16(*value);
        }
        KeyValue::I32(value) => {
            buf.put_u8(TAG_I32);
            buf.put_i32(*value);
        }
        KeyValue::I64(value) => {
            buf.put_u8(TAG_I64);
            buf.put_i64(*value);
        }
        KeyValue::F64(value) => {
            buf.put_u8(TAG_F64);
            buf.put_f64(*value);
        }
        KeyValue::Numeric(value) => {
            put_len_prefixed(buf, TAG_NUMERIC, value.to_string().as_bytes())?;
        }
        KeyValue::String(value) => {
            put_len_prefixed(buf, TAG_STRING, value.as_bytes())?;
        }
        KeyValue::Bytes(value) => {
            put_len_prefixed(buf, TAG_BYTES, value)?;
        }
        KeyValue::Date(value) => {
            buf.put_u8(TAG_DATE);
            buf.put_i32(value.num_days_from_ce());
        }
        KeyValue::Time(value) => {
            buf.put_u8(TAG_TIME);
            buf.put_u32(value.num_seconds_from_midnight());
            buf.put_u32(value.nanosecond());
        }
        KeyValue::Timestamp(value) => {
            buf.put_u8(TAG_TIMESTAMP);
            buf.put_i64(value.and_utc().timestamp_micros());
        }
        KeyValue::TimestampTz(value) => {
            buf.put_u8(TAG_TIMESTAMP_TZ);
            buf.put_i64(value.timestamp_micros());
        }
        KeyValue::Uuid(value) => {
            buf.put_u8(TAG_UUID);
            buf.put_slice(value.as_bytes());
        }
    }

    Ok(())
}

fn put_len_prefixed(buf: &mut BytesMut, tag: u8, bytes: &[u8]) -> CdcResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        cdc_error!(
            ErrorKind::SerializationError,
            "Key component is too large to encode",
            format!("{} bytes exceed the format maximum", bytes.len())
        )
    })?;

    buf.put_u8(tag);
    buf.put_u32(len);
    buf.put_slice(bytes);

    Ok(())
}

fn decode_payload(text: &str) -> Result<CompositeKey, String> {
    let raw = decode_hex(text)
        .map_err(|err| err.detail().unwrap_or("invalid hex text").to_string())?;
    let mut buf = Bytes::from(raw);

    if buf.remaining() < 3 {
        return Err("truncated header".to_string());
    }

    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }

    let count = buf.get_u16() as usize;
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let value =
            decode_value(&mut buf).map_err(|problem| format!("component {index}: {problem}"))?;
        values.push(value);
    }

    if buf.has_remaining() {
        return Err(format!(
            "{} trailing bytes after the last component",
            buf.remaining()
        ));
    }

    Ok(CompositeKey::new(values))
}

fn decode_value(buf: &mut Bytes) -> Result<KeyValue, String> {
    need(buf, 1, "type tag")?;
    let tag = buf.get_u8();

    match tag {
        TAG_BOOL => {
            need(buf, 1, "bool value")?;
            match buf.get_u8() {
                0 => Ok(KeyValue::Bool(false)),
                1 => Ok(KeyValue::Bool(true)),
                other => Err(format!("invalid bool byte {other}")),
            }
        }
        TAG_I16 => {
            need(buf, 2, "i16 value")?;
            Ok(KeyValue::I16(buf.get_i16()))
        }
        TAG_I32 => {
            need(buf, 4, "i32 value")?;
            Ok(KeyValue::I32(buf.get_i32()))
        }
        TAG_I64 => {
            need(buf, 8, "i64 value")?;
            Ok(KeyValue::I64(buf.get_i64()))
        }
        TAG_F64 => {
            need(buf, 8, "f64 value")?;
            Ok(KeyValue::F64(buf.get_f64()))
        }
        TAG_NUMERIC => {
            let bytes = take_len_prefixed(buf, "numeric value")?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| "numeric value is not valid UTF-8".to_string())?;
            let value = BigDecimal::from_str(text)
                .map_err(|err| format!("invalid decimal text '{text}': {err}"))?;
            Ok(KeyValue::Numeric(value))
        }
        TAG_STRING => {
            let bytes = take_len_prefixed(buf, "string value")?;
            let text = String::from_utf8(bytes)
                .map_err(|_| "string value is not valid UTF-8".to_string())?;
            Ok(KeyValue::String(text))
        }
        TAG_BYTES => {
            let bytes = take_len_prefixed(buf, "bytes value")?;
            Ok(KeyValue::Bytes(bytes))
        }
        TAG_DATE => {
            need(buf, 4, "date value")?;
            let days = buf.get_i32();
            NaiveDate::from_num_days_from_ce_opt(days)
                .map(KeyValue::Date)
                .ok_or_else(|| format!("day number {days} is out of range"))
        }
        TAG_TIME => {
            need(buf, 8, "time value")?;
            let seconds = buf.get_u32();
            let nanoseconds = buf.get_u32();
            NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanoseconds)
                .map(KeyValue::Time)
                .ok_or_else(|| {
                    format!("time of day {seconds}s + {nanoseconds}ns is out of range")
                })
        }
        TAG_TIMESTAMP => {
            need(buf, 8, "timestamp value")?;
            let micros = buf.get_i64();
            DateTime::from_timestamp_micros(micros)
                .map(|value| KeyValue::Timestamp(value.naive_utc()))
                .ok_or_else(|| format!("timestamp {micros}us is out of range"))
        }
        TAG_TIMESTAMP_TZ => {
            need(buf, 8, "timestamptz value")?;
            let micros = buf.get_i64();
            DateTime::from_timestamp_micros(micros)
                .map(KeyValue::TimestampTz)
                .ok_or_else(|| format!("timestamp {micros}us is out of range"))
        }
        TAG_UUID => {
            need(buf, 16, "uuid value")?;
            let mut bytes = [0u8; 16];
            buf.copy_to_slice(&mut bytes);
            Ok(KeyValue::Uuid(Uuid::from_bytes(bytes)))
        }
        other => Err(format!("unknown type tag {other:#04x}")),
    }
}

fn need(buf: &Bytes, bytes: usize, what: &str) -> Result<(), String> {
    if buf.remaining() < bytes {
        return Err(format!(
            "truncated payload, expected {bytes} more bytes for {what}"
        ));
    }

    Ok(())
}

fn take_len_prefixed(buf: &mut Bytes, what: &str) -> Result<Vec<u8>, String> {
    need(buf, 4, "length prefix")?;
    let len = buf.get_u32() as usize;
    need(buf, len, what)?;

    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    fn round_trip(key: CompositeKey) {
        let encoded = encode_key(&key).unwrap();
        let decoded = decode_key("incremental_snapshot_primary_key", &encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn integer_components_round_trip() {
        round_trip(CompositeKey::new(vec![
            KeyValue::I16(-7),
            KeyValue::I32(i32::MIN),
            KeyValue::I64(i64::MAX),
        ]));
    }

    #[test]
    fn bool_and_float_components_round_trip() {
        round_trip(CompositeKey::new(vec![
            KeyValue::Bool(true),
            KeyValue::Bool(false),
            KeyValue::F64(-12.625),
        ]));
    }

    #[test]
    fn text_and_binary_components_round_trip() {
        round_trip(CompositeKey::new(vec![
            KeyValue::String("café ☕".to_string()),
            KeyValue::String(String::new()),
            KeyValue::Bytes(vec![0x00, 0xff, 0x7f]),
            KeyValue::Bytes(Vec::new()),
        ]));
    }

    #[test]
    fn numeric_components_round_trip() {
        round_trip(CompositeKey::new(vec![
            KeyValue::Numeric(BigDecimal::from_str("-12345.678900").unwrap()),
            KeyValue::Numeric(BigDecimal::from_str("0").unwrap()),
        ]));
    }

    #[test]
    fn temporal_components_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let time = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap();
        let timestamp =
            NaiveDateTime::parse_from_str("1969-07-20 20:17:40.123456", "%Y-%m-%d %H:%M:%S%.f")
                .unwrap();

        round_trip(CompositeKey::new(vec![
            KeyValue::Date(date),
            KeyValue::Time(time),
            KeyValue::Timestamp(timestamp),
            KeyValue::TimestampTz(timestamp.and_utc()),
        ]));
    }

    #[test]
    fn uuid_components_round_trip() {
        round_trip(CompositeKey::new(vec![KeyValue::Uuid(Uuid::new_v4())]));
    }

    #[test]
    fn empty_key_round_trips() {
        round_trip(CompositeKey::new(vec![]));
    }

    #[test]
    fn decode_names_field_and_text_on_invalid_hex() {
        let err = decode_key("incremental_snapshot_maximum_key", "not-hex").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
        let rendered = err.to_string();
        assert!(rendered.contains("incremental_snapshot_maximum_key"));
        assert!(rendered.contains("not-hex"));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let encoded = encode_key(&CompositeKey::new(vec![KeyValue::I64(42)])).unwrap();
        let truncated = &encoded[..encoded.len() - 2];

        let err = decode_key("k", truncated).unwrap_err();
        assert!(err.to_string().contains("truncated payload"));
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        // Version byte 2 with zero components.
        let err = decode_key("k", "020000").unwrap_err();
        assert!(err.to_string().contains("unsupported format version 2"));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        // Version 1, one component, tag 0x7f.
        let err = decode_key("k", "0100017f").unwrap_err();
        assert!(err.to_string().contains("unknown type tag"));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut encoded = encode_key(&CompositeKey::new(vec![KeyValue::Bool(true)])).unwrap();
        encoded.push_str("00");

        let err = decode_key("k", &encoded).unwrap_err();
        assert!(err.to_string().contains("trailing bytes"));
    }
}
