use super::{Classifier, Decision, SkipReason};
use crate::config;
use crate::model::intent::WriteIntent;
use crate::model::record::{FieldRead, Record};

/// Where the secondary field stands relative to the target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentState {
    Absent,
    Wrong,
    Correct,
}

/// Selects records by term containment on a text field, then corrects a secondary field.
#[derive(Debug, Clone)]
pub struct PredicateClassifier {
    text_field: &'static str,
    required: Vec<String>,
    excluded: Vec<String>,
    target_field: &'static str,
    wrong_markers: Vec<String>,
    correct_markers: Vec<String>,
    target_value: String,
}

fn owned(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

impl PredicateClassifier {
    /// Complete engines ("двигатель … л.с") filed outside the assembled-engines category.
    pub fn engine_assemblies() -> Self {
        PredicateClassifier {
            text_field: config::FIELD_TITLE,
            required: owned(config::ENGINE_REQUIRED_TERMS)
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
            excluded: owned(config::ENGINE_EXCLUDED_TERMS)
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
            target_field: config::FIELD_CATEGORY,
            wrong_markers: owned(config::ENGINE_WRONG_CATEGORY_MARKERS),
            correct_markers: owned(config::ENGINE_CORRECT_CATEGORY_MARKERS),
            target_value: config::ENGINE_TARGET_CATEGORY.to_string(),
        }
    }

    pub fn target_value(&self) -> &str {
        &self.target_value
    }

    pub fn matches_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.required.iter().all(|t| lower.contains(t.as_str()))
            && !self.excluded.iter().any(|t| lower.contains(t.as_str()))
    }

    pub fn current_state(&self, record: &Record) -> CurrentState {
        let current = match record.text(self.target_field) {
            FieldRead::Present(value) => value,
            FieldRead::Missing => return CurrentState::Absent,
            FieldRead::WrongShape => return CurrentState::Wrong,
        };
        if current == self.target_value {
            return CurrentState::Correct;
        }
        if self.wrong_markers.iter().any(|m| current.contains(m.as_str())) {
            return CurrentState::Wrong;
        }
        if self.correct_markers.iter().all(|m| current.contains(m.as_str())) {
            CurrentState::Correct
        } else {
            CurrentState::Wrong
        }
    }
}

impl Classifier for PredicateClassifier {
    fn name(&self) -> &'static str {
        "predicate"
    }

    fn classify(&self, record: &Record) -> Decision {
        let text = match record.text(self.text_field) {
            FieldRead::Present(text) => text,
            FieldRead::Missing => return Decision::NoOp(SkipReason::MissingKey(self.text_field)),
            FieldRead::WrongShape => {
                return Decision::NoOp(SkipReason::WrongShape(self.text_field))
            }
        };
        if !self.matches_text(text) {
            return Decision::NoOp(SkipReason::NoMatch);
        }

        match self.current_state(record) {
            CurrentState::Correct => Decision::NoOp(SkipReason::AlreadyCorrect),
            CurrentState::Absent | CurrentState::Wrong => Decision::Write(WriteIntent::set(
                record.id,
                self.target_field,
                self.target_value.as_str(),
            )),
        }
    }
}
