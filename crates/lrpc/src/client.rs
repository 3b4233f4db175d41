//! Typed client for lrpc endpoints.
//!
//! The failure headers are checked before the body is read: a response
//! carrying `qrpc_code` has no meaningful JSON body.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::debug;

use crate::envelope::{
    FailureCode, RequestEnvelope, ResponseEnvelope, CODE_HEADER, MESSAGE_HEADER,
};
use crate::error::{LrpcError, Result};

/// Client for one lrpc server.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a client for `base_url`, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest` client.
    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call the endpoint at `path` and decode its response body.
    pub async fn call<Req, Rsp>(&self, path: &str, request: &Req) -> Result<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("lrpc call: {}", url);

        let response = self
            .http
            .post(&url)
            .json(&RequestEnvelope::new(request))
            .send()
            .await?
            .error_for_status()?;

        if let Some(err) = failure_from_headers(response.headers()) {
            return Err(err);
        }

        let bytes = response.bytes().await?;
        decode_response(&bytes)
    }
}

/// Read the out-of-band failure headers, if present.
fn failure_from_headers(headers: &HeaderMap) -> Option<LrpcError> {
    let code = headers.get(CODE_HEADER)?;
    let message = headers
        .get(MESSAGE_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    let code = String::from_utf8_lossy(code.as_bytes())
        .trim()
        .parse::<i32>()
        .unwrap_or(FailureCode::Transport.as_i32());

    Some(match FailureCode::from_i32(code) {
        Some(FailureCode::Call) => LrpcError::CallFailed { message },
        _ => LrpcError::TransportFailed { code, message },
    })
}

/// Decode a success envelope into its body.
fn decode_response<Rsp: DeserializeOwned>(bytes: &[u8]) -> Result<Rsp> {
    let envelope: ResponseEnvelope<Option<Box<RawValue>>> =
        serde_json::from_slice(bytes).map_err(LrpcError::Decode)?;

    if !envelope.head.is_success() {
        return Err(LrpcError::CallFailed {
            message: envelope.head.message,
        });
    }

    let body = envelope.body.as_deref().map(RawValue::get).unwrap_or("null");
    serde_json::from_str(body).map_err(LrpcError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct TestResponse {
        #[serde(rename = "Message")]
        message: String,
    }

    fn headers(code: &'static str, message: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CODE_HEADER, HeaderValue::from_static(code));
        headers.insert(MESSAGE_HEADER, HeaderValue::from_static(message));
        headers
    }

    #[test]
    fn test_no_failure_headers() {
        assert!(failure_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_call_failure_header() {
        let err = failure_from_headers(&headers("-1", "master is busy")).unwrap();
        match err {
            LrpcError::CallFailed { message } => assert_eq!(message, "master is busy"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_transport_failure_header() {
        let err = failure_from_headers(&headers("-2", "no such handler: /qrpc/x/y")).unwrap();
        match err {
            LrpcError::TransportFailed { code, message } => {
                assert_eq!(code, -2);
                assert!(message.contains("no such handler"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_code_is_transport_failure() {
        let err = failure_from_headers(&headers("oops", "")).unwrap();
        assert_eq!(err.failure_code(), -2);
    }

    #[test]
    fn test_decode_success_envelope() {
        let rsp: TestResponse = decode_response(
            br#"{"head":{"code":0,"message":""},"body":{"Message":"rsp: kitty"}}"#,
        )
        .unwrap();
        assert_eq!(
            rsp,
            TestResponse {
                message: "rsp: kitty".to_string()
            }
        );
    }

    #[test]
    fn test_decode_nonzero_code() {
        let err = decode_response::<TestResponse>(
            br#"{"head":{"code":3,"message":"stale"},"body":null}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LrpcError::CallFailed { message } if message == "stale"));
    }

    #[test]
    fn test_decode_missing_body_as_null() {
        let rsp: Option<TestResponse> = decode_response(br#"{"head":{"code":0}}"#).unwrap();
        assert!(rsp.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = Client::new("http://127.0.0.1:8000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }
}
