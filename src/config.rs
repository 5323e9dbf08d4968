use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MAX_APPLY_CONCUR: usize = 50;
pub const DEFAULT_CHUNK_SIZE: usize = 100;

pub const HTTP_TIMEOUT_SECONDS: u64 = 35;
pub const HTTP_CONNECT_TIMEOUT: u64 = 20;
pub const ERROR_BODY_SNIPPET: usize = 200;

pub const REST_PATH: &str = "rest/v1";

pub const TABLE_PRODUCTS: &str = "products";
pub const TABLE_CATEGORIES: &str = "categories";

pub const FIELD_ID: &str = "id";
pub const FIELD_SLUG: &str = "slug";
pub const FIELD_NAME: &str = "name";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_CATEGORY_ID: &str = "category_id";
pub const FIELD_MANUFACTURER: &str = "manufacturer";
pub const FIELD_SPECIFICATIONS: &str = "specifications";

pub const UNIVERSAL_MANUFACTURER: &str = "UNIVERSAL";

/// Ordered: the first rule whose keyword occurs in a name wins.
pub const DEFAULT_MANUFACTURER_RULES: &[(&str, &[&str])] = &[
    ("DongFeng", &["dongfeng", "донгфенг"]),
    ("Foton", &["foton", "фотон"]),
    ("Xingtai", &["xingtai", "синтай", "уралец"]),
    ("Jinma", &["jinma", "джинма"]),
    ("ZUBR", &["zubr", "зубр"]),
];

pub const ENGINE_TITLE_PATTERN: &str = "*двигатель*";
pub const ENGINE_REQUIRED_TERMS: &[&str] = &["двигатель", "л.с"];
pub const ENGINE_EXCLUDED_TERMS: &[&str] = &["редуктор", "вентилятор"];
pub const ENGINE_WRONG_CATEGORY_MARKERS: &[&str] = &["Запчасти"];
pub const ENGINE_CORRECT_CATEGORY_MARKERS: &[&str] = &["ДВС", "сборе"];
pub const ENGINE_TARGET_CATEGORY: &str = "ДВС в сборе";

pub static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const ENV_URL: &str = "SUPABASE_URL";
const ENV_URL_PUBLIC: &str = "NEXT_PUBLIC_SUPABASE_URL";
const ENV_API_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_API_KEY_PUBLIC: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";
const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Connection settings for the remote store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub service_key: String,
}

impl Settings {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Values present in the file win; anything it leaves empty is taken from the environment.
    pub async fn from_file(path: &Path) -> AppResult<Self> {
        Self::from_file_with(path, |key| std::env::var(key).ok()).await
    }

    pub async fn from_file_with<F>(path: &Path, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Io(format!("settings file '{}': {}", path.display(), e)))?;
        let file: Settings = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("settings file '{}': {}", path.display(), e))
        })?;

        let merged = file.fill_from(Self::read_lookup(lookup));
        merged.validate()?;
        Ok(merged)
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self::read_lookup(lookup);
        settings.validate()?;
        Ok(settings)
    }

    /// Collects whatever the lookup provides. Nothing is validated here.
    fn read_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .and_then(non_empty)
                .or_else(|| fallback.and_then(|k| lookup(k).and_then(non_empty)))
        };

        Settings {
            url: pick(ENV_URL, Some(ENV_URL_PUBLIC)).unwrap_or_default(),
            api_key: pick(ENV_API_KEY, Some(ENV_API_KEY_PUBLIC)),
            service_key: pick(ENV_SERVICE_KEY, None).unwrap_or_default(),
        }
    }

    /// Keeps every non-empty value of `self` and takes the rest from `other`.
    fn fill_from(self, other: Settings) -> Self {
        Settings {
            url: non_empty(self.url).unwrap_or(other.url),
            api_key: self.api_key.and_then(non_empty).or(other.api_key),
            service_key: non_empty(self.service_key).unwrap_or(other.service_key),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.url.is_empty() {
            return Err(AppError::Config(format!(
                "store URL missing (set {} or {})",
                ENV_URL, ENV_URL_PUBLIC
            )));
        }
        if self.service_key.is_empty() {
            return Err(AppError::Config(format!(
                "service key missing (set {})",
                ENV_SERVICE_KEY
            )));
        }
        if self.api_key.is_none() {
            log(
                LogLevel::Info,
                "No API key configured; the service key is sent as apikey.",
            );
        }
        Ok(())
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or(&self.service_key)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Per-run knobs shared by every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub page_size: usize,
    pub concurrency: usize,
    pub chunk_size: usize,
    pub dry_run: bool,
    pub assume_yes: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: MAX_APPLY_CONCUR,
            chunk_size: DEFAULT_CHUNK_SIZE,
            dry_run: false,
            assume_yes: false,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("page size", self.page_size),
            ("concurrency", self.concurrency),
            ("chunk size", self.chunk_size),
        ] {
            if value == 0 {
                return Err(AppError::Argument(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}
