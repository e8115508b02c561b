//! GitHub REST client used by the tool handlers.
//!
//! Wraps octocrab's raw-route methods so every handler talks JSON
//! (`serde_json::Value`) and gets `McpGithubError` back. Query strings are
//! serialized by octocrab; owner/repo names go through
//! [`sanitize_github_name`], and free-form path or ref values through
//! [`encode_path`] / [`encode_segment`] before building a route.

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;

use crate::error::McpGithubError;

pub type Query = [(&'static str, String)];

#[derive(Clone)]
pub struct GithubClient {
    octocrab: Arc<octocrab::Octocrab>,
    api_url: String,
    authenticated: bool,
}

impl GithubClient {
    pub fn new(octocrab: octocrab::Octocrab, api_url: impl Into<String>) -> Self {
        Self {
            octocrab: Arc::new(octocrab),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            authenticated: false,
        }
    }

    /// Build a client against `api_url`, authenticated when a token is given.
    pub fn connect(token: Option<&str>, api_url: &str) -> Result<Self, McpGithubError> {
        let api_url = api_url.trim_end_matches('/');
        let mut builder = octocrab::OctocrabBuilder::new().base_uri(api_url)?;
        if let Some(token) = token {
            builder = builder.personal_token(token.to_string());
        } else {
            tracing::warn!("No GitHub token provided; API rate limits will be very restrictive");
        }
        let mut client = Self::new(builder.build()?, api_url);
        client.authenticated = token.is_some();
        Ok(client)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Web UI base matching the API base: `https://github.com` for the
    /// public API, the host root for GitHub Enterprise (`.../api/v3`).
    pub fn web_url(&self) -> String {
        match self.api_url.as_str() {
            "https://api.github.com" => "https://github.com".to_string(),
            api => api.trim_end_matches("/api/v3").to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Fail early for `/user/...` endpoints, which GitHub only answers
    /// for an authenticated caller.
    pub fn require_auth(&self) -> Result<(), McpGithubError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(McpGithubError::Unauthenticated)
        }
    }

    pub async fn get(&self, route: &str, query: &Query) -> Result<Value, McpGithubError> {
        let uri = with_query(route, query);
        tracing::debug!(route = %uri, "GET");
        let response = self.octocrab._get(uri).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)
    }

    pub async fn post(&self, route: &str, body: &Value) -> Result<Value, McpGithubError> {
        tracing::debug!(route, "POST");
        let response = self.octocrab._post(route, Some(body)).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)
    }

    pub async fn put(&self, route: &str, body: &Value) -> Result<Value, McpGithubError> {
        tracing::debug!(route, "PUT");
        let response = self.octocrab._put(route, Some(body)).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)
    }

    pub async fn patch(&self, route: &str, body: &Value) -> Result<Value, McpGithubError> {
        tracing::debug!(route, "PATCH");
        let response = self.octocrab._patch(route, Some(body)).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)
    }

    pub async fn delete(&self, route: &str, body: &Value) -> Result<Value, McpGithubError> {
        tracing::debug!(route, "DELETE");
        let response = self.octocrab._delete(route, Some(body)).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)
    }

    /// POST to an endpoint that answers `204 No Content` (or an empty 2xx).
    pub async fn post_no_content(
        &self,
        route: &str,
        body: Option<&Value>,
    ) -> Result<(), McpGithubError> {
        tracing::debug!(route, "POST (no content)");
        let response = self.octocrab._post(route, body).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)?;
        Ok(())
    }

    /// DELETE an endpoint that answers `204 No Content`.
    pub async fn delete_no_content(&self, route: &str) -> Result<(), McpGithubError> {
        tracing::debug!(route, "DELETE (no content)");
        let response = self.octocrab._delete(route, None::<&()>).await?;
        let status = response.status().as_u16();
        parse_response(status, &self.octocrab.body_to_string(response).await?)?;
        Ok(())
    }

    /// Download URL for a workflow run's logs. GitHub redirects it to a
    /// short-lived archive link and requires the same authentication.
    pub fn logs_url(&self, owner: &str, repo: &str, run_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/actions/runs/{}/logs",
            self.api_url, owner, repo, run_id
        )
    }
}

fn with_query(route: &str, query: &Query) -> String {
    if query.is_empty() {
        return route.to_string();
    }
    let pairs: Vec<String> = query
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    format!("{}?{}", route, pairs.join("&"))
}

/// Turn a raw GitHub response into JSON. Empty 2xx bodies (204 and
/// friends) become `null`; anything outside 2xx becomes an `Api` error
/// carrying the status.
fn parse_response(status: u16, body: &str) -> Result<Value, McpGithubError> {
    if !(200..300).contains(&status) {
        return Err(McpGithubError::Api {
            status,
            message: error_message(body),
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| McpGithubError::Other(format!("GitHub returned invalid JSON: {}", e)))
}

const ERROR_BODY_CHARS: usize = 200;

/// GitHub's `message` followed by the per-field `errors[].message`
/// entries. Non-JSON bodies (proxy or 5xx pages) contribute their first
/// non-blank line.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            let details: Vec<String> = json
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .map(|e| {
                            e.get("message")
                                .and_then(Value::as_str)
                                .map(String::from)
                                .unwrap_or_else(|| e.to_string())
                        })
                        .collect()
                })
                .unwrap_or_default();
            return if details.is_empty() {
                message.to_string()
            } else {
                format!("{} ({})", message, details.join(", "))
            };
        }
    }
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(ERROR_BODY_CHARS).collect())
        .unwrap_or_else(|| "empty response body".to_string())
}

/// Decode the base64 `content` of a contents-API file. GitHub wraps the
/// payload at 60 columns, so whitespace is stripped first.
pub fn decode_content(encoded: &str) -> String {
    let cleaned: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| "[binary content]".to_string())
}

pub fn encode_content(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
}

/// Validate that a GitHub owner/repo name doesn't contain characters that
/// could be used for URL injection in raw API routes.
pub fn sanitize_github_name(name: &str, field: &str) -> Result<(), McpGithubError> {
    if name.is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['/', '?', '#', '%', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(McpGithubError::InvalidParam(format!(
                "{} contains invalid character '{}'",
                field, ch
            )));
        }
    }
    if name == "." || name == ".." {
        return Err(McpGithubError::InvalidParam(format!(
            "{} must not be a relative path segment",
            field
        )));
    }
    Ok(())
}

/// Validate a value for use in URL paths: it must be non-empty, free of
/// control characters and must not contain `..` segments. Everything else
/// is left to percent-encoding.
pub fn sanitize_url_value(value: &str, field: &str) -> Result<(), McpGithubError> {
    if value.is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(McpGithubError::InvalidParam(format!(
            "{} contains a control character",
            field
        )));
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(McpGithubError::InvalidParam(format!(
            "{} must not contain '..' segments",
            field
        )));
    }
    Ok(())
}

/// Validate and percent-encode a slash-separated value (file paths,
/// `heads/<branch>` refs). `/` stays the separator.
pub fn encode_path(value: &str, field: &str) -> Result<String, McpGithubError> {
    sanitize_url_value(value, field)?;
    Ok(value
        .split('/')
        .map(|segment| urlencoding::encode(segment))
        .collect::<Vec<_>>()
        .join("/"))
}

/// Validate and percent-encode a value that fills one route segment
/// (branch names, commit refs). A `/` inside it is sent as `%2F`.
pub fn encode_segment(value: &str, field: &str) -> Result<String, McpGithubError> {
    sanitize_url_value(value, field)?;
    Ok(urlencoding::encode(value).into_owned())
}
