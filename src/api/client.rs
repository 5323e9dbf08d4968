use crate::api::query::{selector_param, ReadQuery};
use crate::api::store::RemoteStore;
use crate::config::{self, Settings};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::common::FieldMap;
use crate::model::intent::Selector;
use crate::model::record::Record;
use crate::utils;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;

const PREFER: HeaderName = HeaderName::from_static("prefer");
const APIKEY: HeaderName = HeaderName::from_static("apikey");

/// HTTP client for the store's REST interface.
#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl StoreClient {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::HTTP_TIMEOUT_SECONDS))
            .connect_timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT))
            .build()
            .map_err(AppError::from)?;

        let mut headers = HeaderMap::new();
        headers.insert(APIKEY, header_value(settings.api_key(), "api key")?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", settings.service_key), "service key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(StoreClient {
            client,
            base_url: format!(
                "{}/{}",
                settings.url.trim_end_matches('/'),
                config::REST_PATH
            ),
            headers,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .headers(self.headers.clone())
    }

    async fn send(&self, request: RequestBuilder, log_prefix: &str) -> AppResult<Response> {
        let resp = request.send().await.map_err(|e| {
            let context_str = if e.is_timeout() {
                "Timeout"
            } else if e.is_connect() {
                "Connection"
            } else {
                "Request"
            };
            log(
                LogLevel::Warning,
                &format!("{} {} Error: {}", log_prefix, context_str, e),
            );
            AppError::from(e)
        })?;

        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(self.handle_http_error(resp, status, log_prefix).await)
        }
    }

    async fn read_body(resp: Response, log_prefix: &str) -> AppResult<Bytes> {
        resp.bytes().await.map_err(|e| {
            log(
                LogLevel::Warning,
                &format!("{} - Error reading response body: {}", log_prefix, e),
            );
            AppError::Transport(e.to_string())
        })
    }

    async fn handle_http_error(
        &self,
        resp: Response,
        status: StatusCode,
        log_prefix: &str,
    ) -> AppError {
        let resp_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        let message = format!(
            "{}. Body: {}",
            status.canonical_reason().unwrap_or("Unknown Status"),
            utils::truncate_chars(&resp_text, config::ERROR_BODY_SNIPPET)
        );
        AppError::store(status.as_u16(), message, log_prefix)
    }
}

#[async_trait]
impl RemoteStore for StoreClient {
    async fn fetch_page(
        &self,
        query: &ReadQuery,
        offset: usize,
        limit: usize,
    ) -> AppResult<Vec<Record>> {
        let log_prefix = format!("GET {} @{}+{}", query.table, offset, limit);
        let request = self
            .request(Method::GET, &query.table)
            .query(&query.page_params(offset, limit));

        let resp = self.send(request, &log_prefix).await?;
        let bytes = Self::read_body(resp, &log_prefix).await?;

        serde_json::from_slice::<Vec<Record>>(&bytes).map_err(|e| {
            let snippet = String::from_utf8_lossy(&bytes[..bytes.len().min(config::ERROR_BODY_SNIPPET)]);
            log(
                LogLevel::Error,
                &format!(
                    "{} - Failed to decode page: {}. Snippet: '{}'",
                    log_prefix, e, snippet
                ),
            );
            AppError::decode(e.to_string(), &log_prefix)
        })
    }

    async fn write_fields(
        &self,
        table: &str,
        selector: &Selector,
        fields: &FieldMap,
    ) -> AppResult<()> {
        if selector.is_empty() {
            return Ok(());
        }
        let log_prefix = format!("PATCH {} ({} id(s))", table, selector.len());
        let request = self
            .request(Method::PATCH, table)
            .header(PREFER, HeaderValue::from_static("return=minimal"))
            .query(&[selector_param(selector)])
            .json(fields);

        self.send(request, &log_prefix).await?;
        Ok(())
    }

    async fn count(&self, query: &ReadQuery) -> AppResult<u64> {
        let log_prefix = format!("HEAD {} (count)", query.table);
        let request = self
            .request(Method::HEAD, &query.table)
            .header(PREFER, HeaderValue::from_static("count=exact"))
            .query(&query.count_params());

        let resp = self.send(request, &log_prefix).await?;
        let range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::decode("missing Content-Range header", &log_prefix))?;

        parse_content_range_total(range)
            .ok_or_else(|| AppError::decode(format!("bad Content-Range '{}'", range), &log_prefix))
    }
}

fn header_value(raw: &str, what: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|_| AppError::Config(format!("{} contains characters not allowed in a header", what)))
}

/// `0-24/3573` or `*/3573` → 3573.
pub fn parse_content_range_total(range: &str) -> Option<u64> {
    let (_, total) = range.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
