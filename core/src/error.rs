//! Error types for building, sending and decoding requests.
//!
//! # Design
//! Every failure is returned to the caller of `send`; nothing is logged and
//! dropped. Failures that happen after a response arrived (post-receive hook,
//! body read, handler decode) carry that response so the caller can still
//! inspect status and headers.

use thiserror::Error;

use crate::http::HttpResponse;

/// Boxed error returned by hooks and custom decoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by `RequestBuilder` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The URL could not be parsed. No network call was made.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A header name or value given to the builder was not valid HTTP.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// A request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] EncodeError),

    /// A pre-send hook rejected the request.
    #[error("pre-send hook failed: {0}")]
    BeforeHook(#[source] BoxError),

    /// The transport failed to produce a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A post-receive hook rejected the response.
    #[error("post-receive hook failed: {source}")]
    AfterHook {
        #[source]
        source: BoxError,
        response: Box<HttpResponse>,
    },

    /// The response body could not be read into memory.
    #[error("failed to read response body: {source}")]
    Body {
        #[source]
        source: std::io::Error,
        response: Box<HttpResponse>,
    },

    /// A response handler failed to decode the body. Handlers after `index`
    /// were not run.
    #[error("response handler {index} failed: {source}")]
    Handler {
        index: usize,
        #[source]
        source: DecodeError,
        response: Box<HttpResponse>,
    },

    /// No handler produced a value for a `json_response`/`xml_response` call.
    #[error("no response handler produced a value (status {status})")]
    NoValue { status: http::StatusCode },
}

impl RequestError {
    /// The response received before the failure, if there was one.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            RequestError::AfterHook { response, .. }
            | RequestError::Body { response, .. }
            | RequestError::Handler { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            RequestError::AfterHook { response, .. }
            | RequestError::Body { response, .. }
            | RequestError::Handler { response, .. } => Some(*response),
            _ => None,
        }
    }
}

/// Errors produced by a `Transport`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request context was cancelled before the call.
    #[error("request cancelled")]
    Cancelled,

    /// The request context deadline passed before the call.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// No transport is compiled in.
    #[error("no HTTP transport available; enable the `ureq` feature or supply a transport")]
    Unavailable,

    #[cfg(feature = "ureq")]
    #[error(transparent)]
    Ureq(#[from] ureq::Error),

    #[error(transparent)]
    Other(BoxError),
}

/// Errors produced while decoding a response body.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML decoding failed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error(transparent)]
    Custom(BoxError),
}

/// Errors produced while encoding a request body.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML encoding failed: {0}")]
    Xml(#[from] quick_xml::SeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    use http::StatusCode;

    #[test]
    fn handler_error_keeps_source_and_response() {
        let cause = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = RequestError::Handler {
            index: 1,
            source: DecodeError::Json(cause),
            response: Box::new(HttpResponse::new(StatusCode::OK, "not json")),
        };

        assert!(err.to_string().starts_with("response handler 1 failed"));
        assert!(err.source().is_some());
        assert_eq!(err.response().map(|r| r.status), Some(StatusCode::OK));
        assert!(err.into_response().is_some());
    }

    #[test]
    fn pre_response_errors_have_no_response() {
        let err = RequestError::Transport(TransportError::Cancelled);
        assert!(err.response().is_none());
        assert_eq!(err.to_string(), "transport error: request cancelled");
    }

    #[test]
    fn invalid_url_preserves_parse_error() {
        let source = url::Url::parse("::nope").unwrap_err();
        let err = RequestError::InvalidUrl {
            url: "::nope".to_string(),
            source,
        };
        let inner = err.source().unwrap().downcast_ref::<url::ParseError>();
        assert!(inner.is_some());
    }
}
