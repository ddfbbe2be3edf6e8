use std::cmp::Ordering;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

/// A single scalar component of a collection's primary key.
///
/// Variants mirror the column types supported for chunking keys. Values are never
/// interpreted by the coordinator; they are only compared against components of the
/// same type and serialized into offsets by the key codec.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
}

impl KeyValue {
    /// Compares two components of the same type using the column type's natural
    /// ordering. Returns [`None`] for mismatched types, which never occur for keys of
    /// the same collection unless the schema changed under the snapshot.
    pub fn compare(&self, other: &KeyValue) -> Option<Ordering> {
        match (self, other) {
            (KeyValue::Bool(a), KeyValue::Bool(b)) => Some(a.cmp(b)),
            (KeyValue::I16(a), KeyValue::I16(b)) => Some(a.cmp(b)),
            (KeyValue::I32(a), KeyValue::I32(b)) => Some(a.cmp(b)),
            (KeyValue::I64(a), KeyValue::I64(b)) => Some(a.cmp(b)),
            (KeyValue::F64(a), KeyValue::F64(b)) => Some(a.total_cmp(b)),
            (KeyValue::Numeric(a), KeyValue::Numeric(b)) => Some(a.cmp(b)),
            (KeyValue::String(a), KeyValue::String(b)) => Some(a.cmp(b)),
            (KeyValue::Bytes(a), KeyValue::Bytes(b)) => Some(a.cmp(b)),
            (KeyValue::Date(a), KeyValue::Date(b)) => Some(a.cmp(b)),
            (KeyValue::Time(a), KeyValue::Time(b)) => Some(a.cmp(b)),
            (KeyValue::Timestamp(a), KeyValue::Timestamp(b)) => Some(a.cmp(b)),
            (KeyValue::TimestampTz(a), KeyValue::TimestampTz(b)) => Some(a.cmp(b)),
            (KeyValue::Uuid(a), KeyValue::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Returns the component's type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyValue::Bool(_) => "bool",
            KeyValue::I16(_) => "i16",
            KeyValue::I32(_) => "i32",
            KeyValue::I64(_) => "i64",
            KeyValue::F64(_) => "f64",
            KeyValue::Numeric(_) => "numeric",
            KeyValue::String(_) => "string",
            KeyValue::Bytes(_) => "bytes",
            KeyValue::Date(_) => "date",
            KeyValue::Time(_) => "time",
            KeyValue::Timestamp(_) => "timestamp",
            KeyValue::TimestampTz(_) => "timestamptz",
            KeyValue::Uuid(_) => "uuid",
        }
    }
}

/// An ordered tuple of key components: a composite primary key value at a point in
/// time.
///
/// Components are ordered to match the key column order of the collection they were
/// read from. Total ordering is whatever the source column types define, applied
/// component-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey {
    values: Vec<KeyValue>,
}

impl CompositeKey {
    /// Creates a composite key from its components in key column order.
    pub fn new(values: Vec<KeyValue>) -> Self {
        Self { values }
    }

    /// Returns the key components in key column order.
    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    /// Consumes the key and returns its components.
    pub fn into_values(self) -> Vec<KeyValue> {
        self.values
    }

    /// Returns the number of components.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the key has no components.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compares two keys component-wise, most significant component first.
    ///
    /// Returns [`None`] when the keys have different lengths or a component pair of
    /// mismatched types is reached before the comparison is decided.
    pub fn compare(&self, other: &CompositeKey) -> Option<Ordering> {
        if self.values.len() != other.values.len() {
            return None;
        }

        for (left, right) in self.values.iter().zip(other.values.iter()) {
            match left.compare(right)? {
                Ordering::Equal => continue,
                decided => return Some(decided),
            }
        }

        Some(Ordering::Equal)
    }
}

impl From<Vec<KeyValue>> for CompositeKey {
    fn from(values: Vec<KeyValue>) -> Self {
        Self::new(values)
    }
}
