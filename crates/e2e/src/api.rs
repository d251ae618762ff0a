//! HTTP sessions for the shops API

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::contract::{HttpMethod, RequestBody, SessionVariant};
use crate::error::{E2eError, E2eResult};
use crate::shops::ShopListing;

/// Shops API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listing endpoint path
    pub shops_path: String,

    /// Per-request timeout
    pub request_timeout_ms: u64,

    /// Upper bound for the response time smoke check
    pub max_response_time_ms: u64,

    /// Records checked for required fields
    pub structure_sample: usize,

    /// Records checked for coordinates and work time
    pub validation_sample: usize,

    /// Shop names that must appear in the listing
    pub expected_shops: Vec<String>,

    /// Optional bearer token for the authenticated session
    pub token: Option<String>,

    pub user_agent: String,

    pub accept_language: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            shops_path: "/api/map/shops".to_string(),
            request_timeout_ms: 30_000,
            max_response_time_ms: 2_000,
            structure_sample: 5,
            validation_sample: 10,
            expected_shops: vec![
                "Билайн Калейдоскоп".to_string(),
                "М.Видео Авеню Юго-Западная".to_string(),
            ],
            token: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            accept_language: "en-GB,en-US;q=0.9,en;q=0.8".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn max_response_time(&self) -> Duration {
        Duration::from_millis(self.max_response_time_ms)
    }
}

/// A configured HTTP client bound to the storefront origin
#[derive(Debug, Clone)]
pub struct ApiSession {
    client: reqwest::Client,
    base_url: String,
    shops_path: String,
    variant: SessionVariant,
}

impl ApiSession {
    /// Session with the browser-like headers the storefront frontend sends
    pub fn authenticated(base_url: &str, config: &ApiConfig) -> E2eResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let headers = standard_headers(&base_url, config)?;
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url,
            shops_path: config.shops_path.clone(),
            variant: SessionVariant::Authenticated,
        })
    }

    /// Fresh session with no default headers or credentials
    pub fn anonymous(base_url: &str, config: &ApiConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            shops_path: config.shops_path.clone(),
            variant: SessionVariant::Anonymous,
        })
    }

    pub fn variant(&self) -> SessionVariant {
        self.variant
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request. Bodies are only attached for methods that carry one.
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: &RequestBody,
        headers: &BTreeMap<String, String>,
    ) -> E2eResult<reqwest::Response> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.as_reqwest(), &url)
            .headers(override_headers(headers)?);

        // Overrides are set first, so `json()` keeps an overridden content type
        if method.sends_body() {
            request = match body {
                RequestBody::None => request,
                RequestBody::Json(value) => request.json(value),
                RequestBody::Raw(raw) => request.body(raw.clone()),
            };
        }

        debug!("{} {} ({:?} session)", method, url, self.variant);
        Ok(request.send().await?)
    }

    /// The baseline listing call: `POST {shops_path}` with `{}`
    pub async fn list_shops(&self) -> E2eResult<ShopListing> {
        let response = self
            .send(HttpMethod::Post, &self.shops_path, &RequestBody::Json(json!({})), &BTreeMap::new())
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(E2eError::ContractMismatch {
                case: "shops_listing".to_string(),
                expected: 200,
                actual: status,
            });
        }

        let payload: serde_json::Value = response.json().await?;
        ShopListing::from_response(payload)
    }

    /// Time the baseline listing request alone, whatever status it returns
    pub async fn time_listing_request(&self) -> E2eResult<(u16, Duration)> {
        let start = Instant::now();
        let response = self
            .send(HttpMethod::Post, &self.shops_path, &RequestBody::Json(json!({})), &BTreeMap::new())
            .await?;
        let elapsed = start.elapsed();
        Ok((response.status().as_u16(), elapsed))
    }
}

/// The run-wide authenticated session plus a factory for isolated ones
pub struct SessionPool {
    authenticated: ApiSession,
    base_url: String,
    config: ApiConfig,
}

impl SessionPool {
    pub fn new(base_url: &str, config: &ApiConfig) -> E2eResult<Self> {
        Ok(Self {
            authenticated: ApiSession::authenticated(base_url, config)?,
            base_url: base_url.to_string(),
            config: config.clone(),
        })
    }

    pub fn authenticated(&self) -> &ApiSession {
        &self.authenticated
    }

    /// The shared session, or a brand new anonymous one
    pub fn session(&self, variant: SessionVariant) -> E2eResult<ApiSession> {
        match variant {
            SessionVariant::Authenticated => Ok(self.authenticated.clone()),
            SessionVariant::Anonymous => ApiSession::anonymous(&self.base_url, &self.config),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

fn override_headers(headers: &BTreeMap<String, String>) -> E2eResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| E2eError::CaseTable(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| E2eError::CaseTable(format!("Invalid header value '{}': {}", value, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn standard_headers(base_url: &str, config: &ApiConfig) -> E2eResult<HeaderMap> {
    let invalid = |what: &str, e: header::InvalidHeaderValue| {
        E2eError::Config(format!("Invalid {} header: {}", what, e))
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language).map_err(|e| invalid("Accept-Language", e))?,
    );
    headers.insert(
        header::ORIGIN,
        HeaderValue::from_str(base_url).map_err(|e| invalid("Origin", e))?,
    );
    headers.insert(
        header::REFERER,
        HeaderValue::from_str(&format!("{}/", base_url)).map_err(|e| invalid("Referer", e))?,
    );
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_str(&config.user_agent).map_err(|e| invalid("User-Agent", e))?,
    );
    if let Some(token) = &config.token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| invalid("Authorization", e))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_headers() {
        let headers = standard_headers("https://shop.example", &ApiConfig::default()).unwrap();
        assert_eq!(headers[header::ORIGIN], "https://shop.example");
        assert_eq!(headers[header::REFERER], "https://shop.example/");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(!headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_token_adds_authorization() {
        let config = ApiConfig {
            token: Some("secret".to_string()),
            ..Default::default()
        };
        let headers = standard_headers("https://shop.example", &config).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn test_override_headers() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Content-Type".to_string(), "text/plain".to_string());
        let map = override_headers(&overrides).unwrap();
        assert_eq!(map[header::CONTENT_TYPE], "text/plain");

        overrides.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(override_headers(&overrides), Err(E2eError::CaseTable(_))));
    }

    #[test]
    fn test_session_variants() {
        let pool = SessionPool::new("https://shop.example/", &ApiConfig::default()).unwrap();
        assert_eq!(pool.authenticated().variant(), SessionVariant::Authenticated);
        assert_eq!(pool.authenticated().url("/api/map/shops"), "https://shop.example/api/map/shops");

        let fresh = pool.session(SessionVariant::Anonymous).unwrap();
        assert_eq!(fresh.variant(), SessionVariant::Anonymous);
    }
}
