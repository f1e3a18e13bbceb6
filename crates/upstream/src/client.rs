use common::metrics::record_upstream;
use domain::GatewayError;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::envelope::{error_message, ResultEnvelope};
use crate::UpstreamError;

/// HTTP client for one backend service whose entity type is `T`.
///
/// Each call issues exactly one request. There are no retries; a failed call
/// is final for that attempt.
#[derive(Debug, Clone)]
pub struct ServiceClient<T> {
    name: String,
    base_url: Url,
    http: Client,
    _entity: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ServiceClient<T> {
    /// Build a client rooted at `base_url`; every request is bounded by `timeout`
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl {
            service: name.to_string(),
            message: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl {
                service: name.to_string(),
                message: format!("{} cannot be used as a base URL", base_url),
            });
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport {
                service: name.to_string(),
                message: e.to_string(),
            })?;

        info!(service = %name, base_url = %base_url, timeout_ms = %timeout.as_millis(), "Backend client created");

        Ok(Self {
            name: name.to_string(),
            base_url,
            http,
            _entity: PhantomData,
        })
    }

    /// `GET /`
    pub async fn get_all(&self) -> Result<Vec<T>, GatewayError> {
        let url = self.url(None);
        let started = Instant::now();
        let response = self.http.get(url.clone()).send().await;
        self.finish(url, started, response).await
    }

    /// `GET /:id`
    pub async fn get_by_id(&self, id: &str) -> Result<T, GatewayError> {
        let url = self.url(Some(id));
        let started = Instant::now();
        let response = self.http.get(url.clone()).send().await;
        self.finish(url, started, response).await
    }

    /// `POST /` with a JSON body and extra headers
    pub async fn post<B, R>(&self, body: &B, headers: &[(&str, &str)]) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(None);
        let mut request = self.http.post(url.clone()).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let started = Instant::now();
        let response = request.send().await;
        self.finish(url, started, response).await
    }

    fn url(&self, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            match id {
                Some(id) => {
                    segments.push(id);
                }
                None => {
                    segments.push("");
                }
            }
        }
        url
    }

    async fn finish<R: DeserializeOwned>(
        &self,
        url: Url,
        started: Instant,
        response: Result<Response, reqwest::Error>,
    ) -> Result<R, GatewayError> {
        let result = self.unwrap_response(response).await;
        let elapsed = started.elapsed();
        record_upstream(&self.name, result.is_ok(), elapsed.as_secs_f64());

        match &result {
            Ok(_) => debug!(
                service = %self.name,
                url = %url,
                duration_ms = %elapsed.as_millis(),
                "Backend call succeeded"
            ),
            Err(e) => warn!(
                service = %self.name,
                url = %url,
                duration_ms = %elapsed.as_millis(),
                error = %e,
                "Backend call failed"
            ),
        }

        result.map_err(GatewayError::from)
    }

    async fn unwrap_response<R: DeserializeOwned>(
        &self,
        response: Result<Response, reqwest::Error>,
    ) -> Result<R, UpstreamError> {
        let response = response.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: self.name.clone(),
                status,
                message: error_message(status, &body),
            });
        }

        let envelope: ResultEnvelope<R> =
            serde_json::from_str(&body).map_err(|e| UpstreamError::InvalidBody {
                service: self.name.clone(),
                message: e.to_string(),
            })?;

        envelope.result.ok_or_else(|| UpstreamError::InvalidBody {
            service: self.name.clone(),
            message: "response has no result".to_string(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout {
                service: self.name.clone(),
            }
        } else {
            UpstreamError::Transport {
                service: self.name.clone(),
                message: e.to_string(),
            }
        }
    }
}
