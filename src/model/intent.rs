use crate::model::common::{FieldMap, RecordId};
use serde_json::Value;

/// Which rows a write targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(RecordId),
    AnyOf(Vec<RecordId>),
}

impl Selector {
    pub fn ids(&self) -> &[RecordId] {
        match self {
            Selector::Id(id) => std::slice::from_ref(id),
            Selector::AnyOf(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// A field-set instruction. Values are assigned, never accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub selector: Selector,
    pub fields: FieldMap,
}

impl WriteIntent {
    pub fn set(id: RecordId, field: &str, value: impl Into<Value>) -> Self {
        let mut fields = FieldMap::new();
        fields.insert(field.to_string(), value.into());
        WriteIntent {
            selector: Selector::Id(id),
            fields,
        }
    }
}
