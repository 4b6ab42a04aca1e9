//! Operation calls with class-based deadlines.
//!
//! Every [`OperationRequest`] carries an [`OperationClass`]. [`ApiClient::call`]
//! races the HTTP exchange against the class deadline and an optional caller
//! cancellation token; whichever finishes first decides the outcome, exactly
//! once. Losing the race drops the in-flight request, which closes its
//! connection. For unbounded generation that close is the server's signal to
//! stop work.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use voicestudio_core::{ErrorBody, OperationClass, TimeoutPolicy};

use crate::error::{ApiError, ApiResult};

/// Status the server uses for work it abandoned because the client left.
const STATUS_CLIENT_CLOSED: u16 = 499;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
}

/// One outgoing operation.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub method: Method,
    /// Path relative to the server origin, including the API prefix.
    pub path: String,
    pub body: RequestBody,
    pub class: OperationClass,
}

impl OperationRequest {
    pub fn new(method: Method, path: impl Into<String>, class: OperationClass) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            class,
        }
    }

    pub fn get(path: impl Into<String>, class: OperationClass) -> Self {
        Self::new(Method::GET, path, class)
    }

    pub fn post(path: impl Into<String>, class: OperationClass) -> Self {
        Self::new(Method::POST, path, class)
    }

    pub fn delete(path: impl Into<String>, class: OperationClass) -> Self {
        Self::new(Method::DELETE, path, class)
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// HTTP client that applies the timeout policy.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeouts: TimeoutPolicy,
}

impl ApiClient {
    pub fn new(base: Url, timeouts: TimeoutPolicy) -> ApiResult<Self> {
        // No client-wide timeout: deadlines are per operation class.
        let http = reqwest::Client::builder()
            .user_agent(concat!("voicestudio-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base,
            timeouts,
        })
    }

    pub const fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    /// Run `request` and return the raw success body.
    ///
    /// Rejects with [`ApiError::Timeout`] when the class deadline elapses and
    /// [`ApiError::Cancelled`] when `cancel` fires first.
    pub async fn call(
        &self,
        request: OperationRequest,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<String> {
        let deadline = self.timeouts.deadline(request.class);
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        debug!(
            method = %request.method,
            path = %request.path,
            class = ?request.class,
            "Operation call"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            () = expire(deadline) => Err(ApiError::Timeout {
                after: deadline.unwrap_or_default(),
            }),
            result = self.exchange(request) => result,
        }
    }

    /// [`call`](Self::call) and decode the body as JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: OperationRequest,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<T> {
        let body = self.call(request, cancel).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn exchange(&self, request: OperationRequest) -> ApiResult<String> {
        let url = self.base.join(&request.path)?;
        let builder = self.http.request(request.method, url);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(error_from_response(status, &body))
        }
    }
}

async fn expire(deadline: Option<Duration>) {
    match deadline {
        Some(after) => tokio::time::sleep(after).await,
        None => std::future::pending().await,
    }
}

fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    if status.as_u16() == STATUS_CLIENT_CLOSED {
        return ApiError::Cancelled;
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .ok()
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    ApiError::Operation {
        status: status.as_u16(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_field_is_surfaced_verbatim() {
        let err = error_from_response(StatusCode::NOT_FOUND, r#"{"detail":"not found"}"#);
        assert_eq!(
            err,
            ApiError::Operation {
                status: 404,
                detail: "not found".to_string()
            }
        );
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn non_json_error_bodies_fall_back() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.to_string(), "upstream down");

        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "Service Unavailable");
    }

    #[test]
    fn client_closed_status_is_a_cancellation() {
        let err = error_from_response(
            StatusCode::from_u16(499).unwrap(),
            r#"{"detail":"Generation cancelled"}"#,
        );
        assert_eq!(err, ApiError::Cancelled);
    }

    #[test]
    fn form_fields_are_collected() {
        let request = OperationRequest::post("/api/x", OperationClass::Unbounded)
            .with_form([("description", "calm"), ("model_id", "parler-mini-v1")]);
        assert_eq!(
            request.body,
            RequestBody::Form(vec![
                ("description".to_string(), "calm".to_string()),
                ("model_id".to_string(), "parler-mini-v1".to_string()),
            ])
        );
    }
}
