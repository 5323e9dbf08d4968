use super::{Classifier, Decision, SkipReason};
use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::intent::WriteIntent;
use crate::model::record::{FieldRead, Record};
use std::collections::HashMap;

/// Resolves a key embedded in a nested attribute map against a preloaded key → id table.
#[derive(Debug, Clone)]
pub struct LookupClassifier {
    table: HashMap<String, i64>,
    outer: &'static str,
    inner: &'static str,
    target_field: &'static str,
}

impl LookupClassifier {
    pub fn new(table: HashMap<String, i64>) -> Self {
        LookupClassifier {
            table,
            outer: config::FIELD_SPECIFICATIONS,
            inner: config::FIELD_CATEGORY,
            target_field: config::FIELD_CATEGORY_ID,
        }
    }

    /// Builds the slug → id table from `categories` rows. Rows without a usable slug or id are
    /// dropped; a duplicate slug keeps the first id seen.
    pub fn from_category_rows(rows: &[Record]) -> AppResult<Self> {
        let mut table = HashMap::with_capacity(rows.len());
        let mut dropped = 0usize;
        for row in rows {
            match row.text(config::FIELD_SLUG) {
                FieldRead::Present(slug) if !slug.trim().is_empty() => {
                    table.entry(slug.trim().to_string()).or_insert(row.id);
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            log(
                LogLevel::Warning,
                &format!("Ignored {} category row(s) without a slug.", dropped),
            );
        }
        if table.is_empty() {
            return Err(AppError::Config(
                "category lookup table is empty; nothing to classify against".to_string(),
            ));
        }
        Ok(Self::new(table))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Classifier for LookupClassifier {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn classify(&self, record: &Record) -> Decision {
        let key = match record.nested_text(self.outer, self.inner) {
            FieldRead::Present(key) => key.trim(),
            FieldRead::Missing => return Decision::NoOp(SkipReason::MissingKey(self.inner)),
            FieldRead::WrongShape => return Decision::NoOp(SkipReason::WrongShape(self.inner)),
        };

        let Some(&target) = self.table.get(key) else {
            return Decision::NoOp(SkipReason::UnknownKey(key.to_string()));
        };

        // A malformed current value is overwritten, not trusted.
        if record.integer(self.target_field) == FieldRead::Present(target) {
            return Decision::NoOp(SkipReason::AlreadyCorrect);
        }

        Decision::Write(WriteIntent::set(record.id, self.target_field, target))
    }
}
