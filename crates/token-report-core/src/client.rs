//! Authenticated client for the usage-billing REST API
//!
//! One [`ApiClient`] talks to one base URL. It owns a [`Session`] that is empty
//! until [`ApiClient::login`] succeeds; every later request carries the bearer
//! token. Calls are issued one at a time and never retried.

use crate::config::{Config, DateRange};
use crate::error::{ReportError, Result};
use crate::pagination::{self, FetchedUsage, UsagePageSource};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use url::Url;

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const STATS_PATH: &str = "/api/v1/usage/stats";
pub const USAGE_PATH: &str = "/api/v1/usage";

/// Locations of the bearer token in a login response, checked in order
const TOKEN_POINTERS: [&str; 4] = ["/data/access_token", "/access_token", "/data/token", "/token"];

/// Find the bearer token in a login response.
///
/// The first pointer holding a non-empty string wins.
pub fn extract_token(response: &Value) -> Option<String> {
    TOKEN_POINTERS.iter().find_map(|pointer| {
        response
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(String::from)
    })
}

/// Authentication state of a client.
///
/// Created empty, populated by a successful login, dropped with the client.
/// Never written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(&mut self, token: String) {
        self.token = Some(token);
    }
}

/// Client for the usage-billing API
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    config: Config,
    session: Session,
}

impl ApiClient {
    /// Create a client for `config.base_url` with an empty session
    pub fn new(config: Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|source| ReportError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(concat!("token-report/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
            session: Session::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Exchange the configured credentials for a bearer token.
    ///
    /// Any failure, including a response without a recognised token field, is
    /// reported as [`ReportError::Authentication`].
    #[instrument(skip(self), fields(email = %self.config.email))]
    pub async fn login(&mut self) -> Result<()> {
        let body = json!({
            "email": self.config.email,
            "password": self.config.password,
        });

        let response = self
            .request(Method::POST, LOGIN_PATH, Some(&body))
            .await
            .map_err(|e| ReportError::authentication(e.to_string()))?;

        let token = extract_token(&response).ok_or_else(|| {
            ReportError::authentication(format!("No token in login response. Response: {}", response))
        })?;

        self.session.authorize(token);
        info!("Authenticated against {}", self.base_url);
        Ok(())
    }

    /// Issue one HTTP call against a path relative to the base URL.
    ///
    /// A 2xx body that is not JSON comes back as a JSON string holding the raw
    /// text. Non-2xx statuses become [`ReportError::Http`].
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|source| ReportError::InvalidUrl {
                url: path.to_string(),
                source,
            })?;

        debug!(%method, %url, "API request");

        let mut request = self.http.request(method, url);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = if text.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                text
            };
            return Err(ReportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!(error = %e, "Response is not JSON, returning raw text");
                Ok(Value::String(text))
            }
        }
    }

    /// Build `path?start_date=..&end_date=..&timezone=..`, with `leading`
    /// parameters placed first
    fn range_path(&self, path: &str, leading: &[(&str, String)], range: &DateRange) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in leading {
            query.append_pair(key, value);
        }
        query
            .append_pair("start_date", &range.start_param())
            .append_pair("end_date", &range.end_param())
            .append_pair("timezone", &self.config.timezone);

        format!("{}?{}", path, query.finish())
    }

    /// Raw statistics response for `range`; unwrapping is up to the caller
    pub async fn fetch_stats(&self, range: &DateRange) -> Result<Value> {
        let path = self.range_path(STATS_PATH, &[], range);
        self.request(Method::GET, &path, None).await
    }

    /// One raw page of usage records. The pagination engine always asks for
    /// [`pagination::PAGE_SIZE`] records.
    pub async fn fetch_usage_page(
        &self,
        range: &DateRange,
        page: u32,
        page_size: u32,
    ) -> Result<Value> {
        let leading = [("page", page.to_string()), ("page_size", page_size.to_string())];
        let path = self.range_path(USAGE_PATH, &leading, range);
        self.request(Method::GET, &path, None).await
    }

    /// Every usage record in `range`, see [`pagination::fetch_all`]
    pub async fn fetch_all_usage(
        &self,
        range: &DateRange,
        progress: Option<&mut dyn FnMut(usize, Option<u64>)>,
    ) -> Result<FetchedUsage> {
        pagination::fetch_all(self, range, progress).await
    }
}

impl UsagePageSource for ApiClient {
    async fn fetch_page(&self, range: &DateRange, page: u32, page_size: u32) -> Result<Value> {
        self.fetch_usage_page(range, page, page_size).await
    }
}
