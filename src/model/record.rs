use crate::model::common::{deserialize_record_id, value_as_i64, FieldMap, RecordId};
use serde::Deserialize;
use serde_json::Value;

/// One row as returned by a page read. Never mutated after decoding.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: FieldMap,
}

/// Outcome of reading a typed value out of a loosely-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRead<T> {
    Present(T),
    /// Absent or JSON null.
    Missing,
    WrongShape,
}

impl<T> FieldRead<T> {
    pub fn present(self) -> Option<T> {
        match self {
            FieldRead::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldRead::Missing)
    }
}

impl Record {
    pub fn raw(&self, name: &str) -> FieldRead<&Value> {
        read_raw(&self.fields, name)
    }

    pub fn text(&self, name: &str) -> FieldRead<&str> {
        match self.raw(name) {
            FieldRead::Present(v) => v.as_str().map_or(FieldRead::WrongShape, FieldRead::Present),
            FieldRead::Missing => FieldRead::Missing,
            FieldRead::WrongShape => FieldRead::WrongShape,
        }
    }

    pub fn integer(&self, name: &str) -> FieldRead<i64> {
        match self.raw(name) {
            FieldRead::Present(v) => value_as_i64(v).map_or(FieldRead::WrongShape, FieldRead::Present),
            FieldRead::Missing => FieldRead::Missing,
            FieldRead::WrongShape => FieldRead::WrongShape,
        }
    }

    /// Reads `outer.inner` where `outer` is a nested attribute map (e.g. `specifications`).
    pub fn nested_text(&self, outer: &str, inner: &str) -> FieldRead<&str> {
        let nested = match self.raw(outer) {
            FieldRead::Present(Value::Object(map)) => map,
            FieldRead::Present(_) | FieldRead::WrongShape => return FieldRead::WrongShape,
            FieldRead::Missing => return FieldRead::Missing,
        };
        match read_raw(nested, inner) {
            FieldRead::Present(v) => v.as_str().map_or(FieldRead::WrongShape, FieldRead::Present),
            FieldRead::Missing => FieldRead::Missing,
            FieldRead::WrongShape => FieldRead::WrongShape,
        }
    }
}

fn read_raw<'a>(map: &'a FieldMap, name: &str) -> FieldRead<&'a Value> {
    match map.get(name) {
        None | Some(Value::Null) => FieldRead::Missing,
        Some(v) => FieldRead::Present(v),
    }
}
