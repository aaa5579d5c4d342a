//! RapidAPI basketball-head provider.
//!
//! POSTs `{"query": <player name>}` to the player search endpoint and adapts
//! the JSON payload to a [`RawRecord`]. One attempt per call: retry, backoff
//! and the circuit breaker live in [`super::client::RetrievalClient`].

use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::payload::PlayerPayload;
use super::provider::{RetrievalError, StatsProvider};
use crate::domain::{DataSource, RawRecord, SubjectId};

const SEARCH_PATH: &str = "/players/searchv2";
/// Used when a 429 carries no parseable Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RapidApiSettings {
    pub base_url: String,
    pub host: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RapidApiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://basketball-head.p.rapidapi.com".into(),
            host: "basketball-head.p.rapidapi.com".into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

pub struct RapidApiProvider {
    client: reqwest::blocking::Client,
    settings: RapidApiSettings,
}

impl RapidApiProvider {
    pub fn new(settings: RapidApiSettings) -> Result<Self, RetrievalError> {
        if settings.api_key.trim().is_empty() {
            return Err(RetrievalError::AuthenticationFailed(
                "RapidAPI key is empty".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RetrievalError::NetworkUnreachable(format!("HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn search_url(&self) -> String {
        format!("{}{SEARCH_PATH}", self.settings.base_url.trim_end_matches('/'))
    }
}

/// Error for a non-success HTTP status, `None` for 2xx.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<&str>,
    subject: &SubjectId,
) -> Option<RetrievalError> {
    if status.is_success() {
        return None;
    }
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RetrievalError::AuthenticationFailed(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::NOT_FOUND => RetrievalError::NotFound {
            subject: subject.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => RetrievalError::RateLimited {
            retry_after_secs: retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::REQUEST_TIMEOUT => RetrievalError::Timeout(format!("HTTP {}", status.as_u16())),
        s if s.is_server_error() => RetrievalError::ServerError { status: s.as_u16() },
        s => RetrievalError::MalformedResponse(format!("unexpected HTTP {}", s.as_u16())),
    };
    Some(err)
}

fn transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout(e.to_string())
    } else {
        RetrievalError::NetworkUnreachable(e.to_string())
    }
}

impl StatsProvider for RapidApiProvider {
    fn name(&self) -> &str {
        "rapidapi_basketball_head"
    }

    fn fetch(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError> {
        debug!(subject = %subject, "requesting player stats");
        let resp = self
            .client
            .post(self.search_url())
            .header("x-rapidapi-key", &self.settings.api_key)
            .header("x-rapidapi-host", &self.settings.host)
            .json(&SearchRequest {
                query: subject.as_str(),
            })
            .send()
            .map_err(transport_error)?;

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(err) = classify_status(resp.status(), retry_after.as_deref(), subject) {
            return Err(err);
        }

        let body = resp.bytes().map_err(transport_error)?;
        PlayerPayload::from_slice(&body, subject)?.into_record(subject, Utc::now(), DataSource::RapidApi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> SubjectId {
        SubjectId::new("Kevin Durant")
    }

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK, None, &id()).is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, &id()),
            Some(RetrievalError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, &id()),
            Some(RetrievalError::AuthenticationFailed(_))
        ));
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, None, &id()),
            Some(RetrievalError::NotFound {
                subject: "Kevin Durant".into()
            })
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, None, &id()),
            Some(RetrievalError::ServerError { status: 502 })
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, &id()),
            Some(RetrievalError::MalformedResponse(_))
        ));
    }

    #[test]
    fn rate_limit_reads_retry_after() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some("7"), &id()),
            Some(RetrievalError::RateLimited { retry_after_secs: 7 })
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some("soon"), &id()),
            Some(RetrievalError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            })
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            RapidApiProvider::new(RapidApiSettings::new("  ")),
            Err(RetrievalError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn search_url_joins_cleanly() {
        let mut settings = RapidApiSettings::new("k");
        settings.base_url = "http://localhost:9/".into();
        let p = RapidApiProvider::new(settings).unwrap();
        assert_eq!(p.search_url(), "http://localhost:9/players/searchv2");
    }
}
