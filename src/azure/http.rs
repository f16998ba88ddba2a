//! HTTP utilities for Azure management REST API calls

use super::error::{CarbonError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Longest user-facing error message, in characters
const MAX_MESSAGE_CHARS: usize = 120;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Bounded retry for throttled or unavailable responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Upper bound on a single server-requested wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_delay: Duration::from_secs(120),
        }
    }
}

/// 429 and 5xx are worth retrying
pub fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    // A date in the past means "retry now"
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Server-directed delay for a transient response, if it asked for one
fn retry_delay(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if !is_transient(status) {
        return None;
    }

    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

/// HTTP client wrapper for Azure management API calls
#[derive(Clone)]
pub struct AzureHttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl AzureHttpClient {
    /// Create a new HTTP client
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azure-carbon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, retry })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<String> {
        self.execute::<()>(url, token, None).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<B>(&self, url: &str, token: &str, body: &B) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        self.execute(url, token, Some(body)).await
    }

    /// POST `payload` as JSON when present, GET otherwise
    ///
    /// Throttled (429) and server-error (5xx) responses carrying `Retry-After`
    /// are retried after the requested delay, up to `max_retries` times.
    /// Anything else that is not a success fails with [`CarbonError::Http`].
    pub async fn execute<B>(&self, url: &str, token: &str, payload: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let body = payload
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| CarbonError::Api(format!("Failed to serialize request: {}", e)))?;
        let method = if body.is_some() { Method::POST } else { Method::GET };

        let mut attempt = 0u32;
        loop {
            tracing::debug!("{} {}", method, url);

            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(token)
                .header(reqwest::header::ACCEPT, "application/json");

            if let Some(bytes) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }

            let response = request.send().await?;
            let status = response.status();
            let delay = retry_delay(status, response.headers());
            let response_body = response.text().await?;

            if status.is_success() {
                return Ok(response_body);
            }

            if let Some(delay) = delay {
                if attempt < self.retry.max_retries {
                    attempt += 1;
                    let delay = delay.min(self.retry.max_delay);
                    tracing::warn!(
                        "{} from {}, retrying in {:?} (attempt {}/{})",
                        status,
                        url,
                        delay,
                        attempt,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(CarbonError::Http {
                status: status.as_u16(),
                body: response_body,
            });
        }
    }
}

/// Format an Azure API error for display
/// Security: Maps status codes to generic messages instead of echoing API details
pub fn format_azure_error(error: &CarbonError) -> String {
    match error {
        CarbonError::Http { status, .. } => match *status {
            400 => "Invalid request. Check your parameters and filters.".to_string(),
            401 => "Authentication failed. Run 'az login'.".to_string(),
            403 => "Permission denied. Check your Azure RBAC role assignments.".to_string(),
            404 => "Resource not found. Check the subscription and resource group.".to_string(),
            409 => "Request conflict. Please try again.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            500..=599 => "Azure service temporarily unavailable. Please try again.".to_string(),
            _ => format!("Request failed with status {}.", status),
        },
        CarbonError::Auth(_) => {
            "No Azure credentials available. Run 'az login' or set AZURE_CLIENT_ID, \
             AZURE_CLIENT_SECRET and AZURE_TENANT_ID."
                .to_string()
        }
        CarbonError::Transport(_) => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        other => {
            let message: String = other.to_string().chars().filter(|c| !c.is_control()).collect();

            if message.chars().count() > MAX_MESSAGE_CHARS {
                let truncated: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
                format!("{}...", truncated)
            } else {
                message
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient(StatusCode::NOT_FOUND));
        assert!(!is_transient(StatusCode::FORBIDDEN));
        assert!(!is_transient(StatusCode::OK));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("1", now), Some(Duration::from_secs(1)));
        assert_eq!(parse_retry_after(" 30 ", now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_retry_after_garbage() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
        assert_eq!(parse_retry_after("-1", Utc::now()), None);
    }

    #[test]
    fn test_retry_delay_requires_transient_status() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));

        assert_eq!(
            retry_delay(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            retry_delay(StatusCode::BAD_GATEWAY, &headers),
            Some(Duration::from_secs(5))
        );
        assert_eq!(retry_delay(StatusCode::NOT_FOUND, &headers), None);
        assert_eq!(
            retry_delay(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            None
        );
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
        assert!(sanitized.len() < 300);
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("bad\nline\tend"), "badlineend");
    }

    #[test]
    fn test_format_azure_error_by_status() {
        let err = CarbonError::Http {
            status: 403,
            body: "{\"error\":{\"message\":\"secret detail\"}}".to_string(),
        };
        let message = format_azure_error(&err);
        assert!(message.contains("Permission denied"));
        assert!(!message.contains("secret detail"));

        let err = CarbonError::Http {
            status: 503,
            body: String::new(),
        };
        assert!(format_azure_error(&err).contains("temporarily unavailable"));
    }

    #[test]
    fn test_format_azure_error_passes_filter_errors_through() {
        let err = CarbonError::FilterFormat("'ResourceType' is missing '='".to_string());
        assert!(format_azure_error(&err).contains("missing '='"));
    }

    #[test]
    fn test_format_azure_error_keeps_non_ascii() {
        let err = CarbonError::FilterFormat("'kostenstelle_ü' is missing '='".to_string());
        assert_eq!(
            format_azure_error(&err),
            "Invalid filter expression: 'kostenstelle_ü' is missing '='"
        );
    }

    #[test]
    fn test_format_azure_error_truncates_by_characters() {
        let err = CarbonError::Api("ü".repeat(200));
        let message = format_azure_error(&err);

        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS + 3);
    }

    #[test]
    fn test_format_azure_error_strips_control_characters() {
        let err = CarbonError::Api("line one\nline two".to_string());
        assert_eq!(
            format_azure_error(&err),
            "Unexpected API response: line oneline two"
        );
    }
}
