use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde_json::{Map, Value};
use std::fmt;

pub type RecordId = i64;

/// Field name → value, as sent to or read from the store.
pub type FieldMap = Map<String, Value>;

/// Identifiers arrive as JSON numbers, but some tables expose them as numeric strings.
pub fn deserialize_record_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    struct RecordIdVisitor;
    impl<'de> Visitor<'de> for RecordIdVisitor {
        type Value = RecordId;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer or string int identifier")
        }
        #[inline]
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v)
        }
        #[inline]
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }
        #[inline]
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.trim()
                .parse::<i64>()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &"string int"))
        }
    }
    deserializer.deserialize_any(RecordIdVisitor)
}

/// Integer view of a JSON value: whole numbers only, never strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}
