use super::{Classifier, Decision, SkipReason};
use crate::config;
use crate::error::{AppError, AppResult};
use crate::model::intent::WriteIntent;
use crate::model::record::{FieldRead, Record};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub target: String,
    pub keywords: Vec<String>,
}

/// Matches a lower-cased display name against rules tried in list order; the first hit wins.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
    name_field: &'static str,
    target_field: &'static str,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>) -> AppResult<Self> {
        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            let target = rule.target.trim().to_string();
            let keywords: Vec<String> = rule
                .keywords
                .iter()
                .map(|k| normalize(k))
                .filter(|k| !k.is_empty())
                .collect();
            if target.is_empty() || keywords.is_empty() {
                return Err(AppError::Config(format!(
                    "keyword rule '{}' needs a target and at least one keyword",
                    rule.target
                )));
            }
            normalized.push(KeywordRule { target, keywords });
        }
        if normalized.is_empty() {
            return Err(AppError::Config("keyword rule list is empty".to_string()));
        }

        Ok(KeywordClassifier {
            rules: normalized,
            name_field: config::FIELD_NAME,
            target_field: config::FIELD_MANUFACTURER,
        })
    }

    pub fn default_manufacturers() -> Self {
        let rules = config::DEFAULT_MANUFACTURER_RULES
            .iter()
            .map(|(target, keywords)| KeywordRule {
                target: target.to_string(),
                keywords: keywords.iter().map(|k| normalize(k)).collect(),
            })
            .collect();
        KeywordClassifier {
            rules,
            name_field: config::FIELD_NAME,
            target_field: config::FIELD_MANUFACTURER,
        }
    }

    /// Reads an ordered JSON array of `{"target": ..., "keywords": [...]}`.
    pub async fn from_rules_file(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Io(format!("rules file '{}': {}", path.display(), e)))?;
        let rules: Vec<KeywordRule> = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("rules file '{}': {}", path.display(), e)))?;
        Self::new(rules)
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn match_target(&self, name: &str) -> Option<&str> {
        let haystack = normalize(name);
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|rule| rule.target.as_str())
    }
}

fn normalize(text: &str) -> String {
    config::WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn classify(&self, record: &Record) -> Decision {
        let name = match record.text(self.name_field) {
            FieldRead::Present(name) => name,
            FieldRead::Missing => return Decision::NoOp(SkipReason::MissingKey(self.name_field)),
            FieldRead::WrongShape => {
                return Decision::NoOp(SkipReason::WrongShape(self.name_field))
            }
        };

        let Some(target) = self.match_target(name) else {
            return Decision::NoOp(SkipReason::NoMatch);
        };

        if record.text(self.target_field) == FieldRead::Present(target) {
            return Decision::NoOp(SkipReason::AlreadyCorrect);
        }

        Decision::Write(WriteIntent::set(record.id, self.target_field, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn foton_only() -> KeywordClassifier {
        KeywordClassifier::new(vec![KeywordRule {
            target: "Foton".to_string(),
            keywords: vec!["foton".to_string(), "фотон".to_string()],
        }])
        .unwrap()
    }

    #[test]
    fn latin_keyword_in_cyrillic_name_matches() {
        let r = record(json!({"id": 1, "name": "Двигатель Foton FT-1000", "manufacturer": "UNIVERSAL"}));
        assert_eq!(
            foton_only().classify(&r),
            Decision::Write(WriteIntent::set(1, "manufacturer", "Foton"))
        );
    }

    #[test]
    fn unrelated_name_is_noop() {
        let r = record(json!({"id": 2, "name": "Насос гидравлический", "manufacturer": "UNIVERSAL"}));
        assert_eq!(
            foton_only().classify(&r),
            Decision::NoOp(SkipReason::NoMatch)
        );
    }

    #[test]
    fn cyrillic_keyword_matches_case_insensitively() {
        let r = record(json!({"id": 3, "name": "Фильтр ФОТОН 254"}));
        assert!(matches!(foton_only().classify(&r), Decision::Write(_)));
    }

    #[test]
    fn current_target_is_noop() {
        let r = record(json!({"id": 4, "name": "Foton стартер", "manufacturer": "Foton"}));
        assert_eq!(
            foton_only().classify(&r),
            Decision::NoOp(SkipReason::AlreadyCorrect)
        );
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        let c = KeywordClassifier::default_manufacturers();
        // Names both DongFeng and Foton; DongFeng is declared first.
        assert_eq!(c.match_target("Шестерня Foton / DongFeng 244"), Some("DongFeng"));
        assert_eq!(c.match_target("Кронштейн Уралец 220"), Some("Xingtai"));
        assert_eq!(c.match_target("Болт М10"), None);
    }

    #[test]
    fn rule_order_is_stable_across_constructions() {
        let a: Vec<String> = KeywordClassifier::default_manufacturers()
            .rules()
            .iter()
            .map(|r| r.target.clone())
            .collect();
        assert_eq!(a, vec!["DongFeng", "Foton", "Xingtai", "Jinma", "ZUBR"]);
    }

    #[test]
    fn empty_rules_are_rejected() {
        assert!(KeywordClassifier::new(Vec::new()).is_err());
        assert!(KeywordClassifier::new(vec![KeywordRule {
            target: "Foton".to_string(),
            keywords: vec!["  ".to_string()],
        }])
        .is_err());
    }

    #[test]
    fn missing_name_is_noop() {
        let r = record(json!({"id": 5, "name": null}));
        assert_eq!(
            foton_only().classify(&r),
            Decision::NoOp(SkipReason::MissingKey("name"))
        );
    }
}
