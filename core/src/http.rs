//! HTTP request and response types exchanged with the transport.
//!
//! # Design
//! These types describe a finalized request and a received response as plain
//! data. The builder produces an `HttpRequest`; a `Transport` turns it into an
//! `HttpResponse`. Nothing here touches the network, which keeps the builder
//! and the dispatch logic testable with in-memory transports.
//!
//! Headers use `http::HeaderMap`, so keys compare case-insensitively and each
//! key keeps its values in insertion order.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::context::Context;
use crate::error::DecodeError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this method may carry a payload.
    pub fn accepts_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// A finalized HTTP request.
///
/// Produced by `RequestBuilder::build`. Pre-send hooks receive it mutably
/// before it is handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub context: Context,
}

/// Body of a received response.
///
/// Starts out as a streaming reader handed over by the transport. Once
/// buffered it holds the bytes in memory and can be read again from the
/// start with [`ResponseBody::buffered`].
///
/// The reader sits behind a `Mutex` only so the response (and errors that
/// carry it) stay `Sync`; it is always accessed through `&mut self`.
pub enum ResponseBody {
    Reader(Mutex<Box<dyn Read + Send>>),
    Buffered(Cursor<Bytes>),
}

impl ResponseBody {
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        ResponseBody::Reader(Mutex::new(Box::new(reader)))
    }

    pub fn empty() -> Self {
        ResponseBody::Buffered(Cursor::new(Bytes::new()))
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, ResponseBody::Buffered(_))
    }

    /// Read whatever is left of the body into memory.
    ///
    /// After this call the body is buffered and reading starts over from the
    /// first byte. Calling it on an already buffered body is cheap.
    pub fn buffer(&mut self) -> io::Result<Bytes> {
        let bytes = match self {
            ResponseBody::Buffered(cursor) => return Ok(cursor.get_ref().clone()),
            ResponseBody::Reader(reader) => {
                let mut buf = Vec::new();
                reader
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .read_to_end(&mut buf)?;
                Bytes::from(buf)
            }
        };
        *self = ResponseBody::Buffered(Cursor::new(bytes.clone()));
        Ok(bytes)
    }

    /// The buffered bytes, or `None` while the body is still a stream.
    pub fn buffered(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Buffered(cursor) => Some(cursor.get_ref()),
            ResponseBody::Reader(_) => None,
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Buffered(Cursor::new(bytes))
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<&'static str> for ResponseBody {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl From<String> for ResponseBody {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ResponseBody::Reader(reader) => reader
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .read(buf),
            ResponseBody::Buffered(cursor) => cursor.read(buf),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Reader(_) => f.write_str("ResponseBody::Reader(..)"),
            ResponseBody::Buffered(cursor) => f
                .debug_tuple("ResponseBody::Buffered")
                .field(&cursor.get_ref().len())
                .finish(),
        }
    }
}

/// An HTTP response as returned by the transport.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Buffer the whole body and return it. The body stays readable.
    pub fn bytes(&mut self) -> io::Result<Bytes> {
        self.body.buffer()
    }

    /// Buffer the body and decode it as (lossy) UTF-8 text.
    pub fn text(&mut self) -> io::Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T, DecodeError> {
        let bytes = self.bytes().map_err(|e| DecodeError::Custom(Box::new(e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn xml<T: DeserializeOwned>(&mut self) -> Result<T, DecodeError> {
        let bytes = self.bytes().map_err(|e| DecodeError::Custom(Box::new(e)))?;
        Ok(quick_xml::de::from_reader(bytes.as_ref())?)
    }
}

/// Read-only view of a buffered response handed to each response handler.
///
/// Every handler gets its own view over the complete buffer, so a handler
/// that reads the body to the end cannot starve the ones after it.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    body: &'a [u8],
}

impl<'a> ResponseView<'a> {
    pub fn new(status: StatusCode, headers: &'a HeaderMap, body: &'a [u8]) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// A fresh reader positioned at the start of the body.
    pub fn reader(&self) -> impl io::BufRead + 'a {
        self.body
    }
}
