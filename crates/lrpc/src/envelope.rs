//! Wire envelopes shared by every endpoint.
//!
//! Requests and responses wrap an endpoint-specific body in a small head:
//!
//! ```text
//! request:  {"head": {}, "body": <json>}
//! response: {"head": {"code": 0, "message": ""}, "body": <json>}
//! ```
//!
//! Failures never travel in the JSON body. They are reported through the
//! `qrpc_code` / `qrpc_message` response headers, see [`FailureCode`].

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Response header carrying the failure code.
pub const CODE_HEADER: &str = "qrpc_code";

/// Response header carrying the failure message.
pub const MESSAGE_HEADER: &str = "qrpc_message";

/// Out-of-band failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    /// The handler ran and returned an error.
    Call,
    /// The call never reached a handler, or its result could not be written.
    Transport,
}

impl FailureCode {
    pub fn as_i32(self) -> i32 {
        match self {
            FailureCode::Call => -1,
            FailureCode::Transport => -2,
        }
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            -1 => Some(FailureCode::Call),
            -2 => Some(FailureCode::Transport),
            _ => None,
        }
    }
}

/// Request metadata. Currently carries nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHead {}

/// Inbound call envelope.
///
/// The server decodes `B = Box<RawValue>` so the body stays undecoded until
/// the handler (and with it the concrete request type) is known.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestEnvelope<B = Box<RawValue>> {
    #[serde(default)]
    pub head: RequestHead,
    pub body: B,
}

impl<B> RequestEnvelope<B> {
    pub fn new(body: B) -> Self {
        Self {
            head: RequestHead::default(),
            body,
        }
    }
}

/// Response metadata. `code == 0` is success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHead {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Outbound result envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope<B = Box<RawValue>> {
    #[serde(default)]
    pub head: ResponseHead,
    pub body: B,
}

impl<B> ResponseEnvelope<B> {
    /// Wrap a handler result with a zero code and empty message.
    pub fn success(body: B) -> Self {
        Self {
            head: ResponseHead::default(),
            body,
        }
    }
}
