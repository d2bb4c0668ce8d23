//! HTTP transport for the remote analysis service
//!
//! Wire protocol:
//! - `POST dispatch_url` with `{"data": [row, ...]}`. Replies are either
//!   `{"data": {"insights": {...}}}` (direct) or
//!   `{"data": {"correlationId": "..."}}` (asynchronous job).
//! - `GET status_url?correlationId=...` replies
//!   `{"status": "pending"|"completed"|"failed", "data": {...}}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::AnalysisError;
use crate::models::Transaction;

/// Body of the initial dispatch request
#[derive(Debug, Serialize)]
pub struct DispatchRequest<'a> {
    pub data: &'a [Transaction],
}

/// Remote service seam
///
/// Implementations return the decoded JSON body of a successful (2xx)
/// response. Non-2xx statuses and network errors are `TransportFailure`,
/// undecodable bodies are `MalformedResponse`.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn dispatch(
        &self,
        url: &str,
        request: &DispatchRequest<'_>,
    ) -> Result<Value, AnalysisError>;

    async fn status(&self, url: &str, correlation_id: &str) -> Result<Value, AnalysisError>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, AnalysisError> {
        let http_client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http_client })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, AnalysisError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::TransportFailure(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn dispatch(
        &self,
        url: &str,
        request: &DispatchRequest<'_>,
    ) -> Result<Value, AnalysisError> {
        debug!(url, rows = request.data.len(), "Dispatching transactions");
        let response = self
            .http_client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn status(&self, url: &str, correlation_id: &str) -> Result<Value, AnalysisError> {
        let response = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(&[("correlationId", correlation_id)])
            .send()
            .await?;
        Self::read_json(response).await
    }
}

/// Interpretation of a dispatch reply
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchReply {
    /// Result-like insights object, ready for validation
    Insights(Value),
    /// Asynchronous job to poll
    Accepted { correlation_id: String },
}

/// Interpretation of a status reply
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    Pending,
    /// Job finished; the payload still has to pass result validation
    Completed(Value),
    Failed(String),
}

pub fn interpret_dispatch(body: Value) -> Result<DispatchReply, AnalysisError> {
    let Value::Object(mut root) = body else {
        return Err(AnalysisError::MalformedResponse(
            "response is not a JSON object".into(),
        ));
    };
    let Some(Value::Object(mut data)) = root.remove("data") else {
        return Err(AnalysisError::MalformedResponse("missing data object".into()));
    };

    match data.remove("insights") {
        Some(insights) if !insights.is_null() => return Ok(DispatchReply::Insights(insights)),
        _ => {}
    }

    match data.remove("correlationId") {
        Some(Value::String(id)) if !id.is_empty() => {
            Ok(DispatchReply::Accepted { correlation_id: id })
        }
        Some(Value::Number(n)) => Ok(DispatchReply::Accepted {
            correlation_id: n.to_string(),
        }),
        _ => Err(AnalysisError::MalformedResponse(
            "data has neither insights nor correlationId".into(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub fn interpret_status(body: Value) -> Result<StatusReply, AnalysisError> {
    let raw: RawStatus = serde_json::from_value(body)?;

    match raw.status.to_ascii_lowercase().as_str() {
        // A finished job is terminal even without usable data; `Null` fails
        // validation downstream and ends polling on the fallback path
        "completed" => {
            let data = match raw.data {
                Some(Value::Object(mut obj)) if obj.contains_key("insights") => {
                    obj.remove("insights").unwrap_or(Value::Null)
                }
                Some(data) => data,
                None => Value::Null,
            };
            Ok(StatusReply::Completed(data))
        }
        "failed" => Ok(StatusReply::Failed(
            raw.error.unwrap_or_else(|| "remote job failed".to_string()),
        )),
        "pending" => Ok(StatusReply::Pending),
        other => {
            debug!(status = other, "Unknown job status, treating as pending");
            Ok(StatusReply::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpret_direct() {
        let reply = interpret_dispatch(json!({"data": {"insights": {"summary": "x"}}})).unwrap();
        assert_eq!(reply, DispatchReply::Insights(json!({"summary": "x"})));
    }

    #[test]
    fn test_interpret_accepted() {
        let reply = interpret_dispatch(json!({"data": {"correlationId": "job-1"}})).unwrap();
        assert_eq!(
            reply,
            DispatchReply::Accepted {
                correlation_id: "job-1".into()
            }
        );

        let reply = interpret_dispatch(json!({"data": {"correlationId": 42}})).unwrap();
        assert_eq!(
            reply,
            DispatchReply::Accepted {
                correlation_id: "42".into()
            }
        );
    }

    #[test]
    fn test_interpret_malformed() {
        for body in [
            json!([1, 2]),
            json!({"ok": true}),
            json!({"data": "text"}),
            json!({"data": {"insights": null}}),
            json!({"data": {"correlationId": ""}}),
        ] {
            assert!(matches!(
                interpret_dispatch(body),
                Err(AnalysisError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_interpret_status() {
        assert_eq!(
            interpret_status(json!({"status": "pending"})).unwrap(),
            StatusReply::Pending
        );
        assert_eq!(
            interpret_status(json!({"status": "queued"})).unwrap(),
            StatusReply::Pending
        );
        assert_eq!(
            interpret_status(json!({"status": "completed", "data": {"summary": "s"}})).unwrap(),
            StatusReply::Completed(json!({"summary": "s"}))
        );
        assert_eq!(
            interpret_status(json!({"status": "completed", "data": {"insights": {"a": 1}}}))
                .unwrap(),
            StatusReply::Completed(json!({"a": 1}))
        );
        assert_eq!(
            interpret_status(json!({"status": "failed", "error": "boom"})).unwrap(),
            StatusReply::Failed("boom".into())
        );
        assert_eq!(
            interpret_status(json!({"status": "completed"})).unwrap(),
            StatusReply::Completed(Value::Null)
        );
        assert_eq!(
            interpret_status(json!({"status": "completed", "data": null})).unwrap(),
            StatusReply::Completed(Value::Null)
        );
        assert!(interpret_status(json!({"nope": 1})).is_err());
    }

    #[test]
    fn test_dispatch_request_shape() {
        use crate::models::{CellValue, RawRow};

        let mut fields = RawRow::new();
        fields.insert("Amount", CellValue::from_text("-3"));
        let txs = vec![Transaction {
            amount: -3.0,
            category: "Uncategorized".into(),
            fields,
        }];
        let body = serde_json::to_value(DispatchRequest { data: &txs }).unwrap();
        assert_eq!(body, json!({"data": [{"Amount": "-3"}]}));
    }
}
