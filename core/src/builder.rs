//! Immutable, chainable request builder and the send/dispatch sequence.
//!
//! # Design
//! Every configuration call takes `&self` and returns a new builder, so a
//! partially configured builder can be kept around and branched into many
//! requests without the branches seeing each other's headers or parameters.
//!
//! The method is part of the builder's type. `GetBuilder` and `DeleteBuilder`
//! do not have body setters; `PostBuilder`, `PutBuilder` and `PatchBuilder`
//! do.
//!
//! Sending is one blocking sequence: build, pre-send hooks, one transport
//! call, and, when response handlers are registered, post-receive hooks,
//! body buffering and handler dispatch in registration order.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use crate::context::Context;
use crate::error::{BoxError, EncodeError, RequestError};
use crate::handler::{json_handler, xml_handler, ResponseHandler, Target};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseView};
use crate::method::{Delete, Get, Method, Patch, Payload, Post, Put};
use crate::transport::{default_transport, Transport};
use crate::values::{Form, Values};

pub const MIME_TYPE_JSON: &str = "application/json";
pub const MIME_TYPE_XML: &str = "application/xml";
pub const MIME_TYPE_FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";

/// Hook run against the finalized request before it is sent.
pub type BeforeHook = Arc<dyn Fn(&mut HttpRequest) -> Result<(), BoxError> + Send + Sync>;

/// Hook run against the raw response before handlers decode it.
pub type AfterHook = Arc<dyn Fn(&mut HttpResponse) -> Result<(), BoxError> + Send + Sync>;

pub type GetBuilder = RequestBuilder<Get>;
pub type PostBuilder = RequestBuilder<Post>;
pub type PutBuilder = RequestBuilder<Put>;
pub type PatchBuilder = RequestBuilder<Patch>;
pub type DeleteBuilder = RequestBuilder<Delete>;

/// Option accepted by the top-level constructors and [`Builder::from_options`].
pub enum BuilderOption {
    Transport(Arc<dyn Transport>),
    Before(BeforeHook),
    After(AfterHook),
}

impl BuilderOption {
    pub fn transport(transport: Arc<dyn Transport>) -> Self {
        BuilderOption::Transport(transport)
    }

    pub fn before<F>(hook: F) -> Self
    where
        F: Fn(&mut HttpRequest) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        BuilderOption::Before(Arc::new(hook))
    }

    pub fn after<F>(hook: F) -> Self
    where
        F: Fn(&mut HttpResponse) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        BuilderOption::After(Arc::new(hook))
    }
}

impl fmt::Debug for BuilderOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderOption::Transport(_) => f.write_str("BuilderOption::Transport(..)"),
            BuilderOption::Before(_) => f.write_str("BuilderOption::Before(..)"),
            BuilderOption::After(_) => f.write_str("BuilderOption::After(..)"),
        }
    }
}

/// Method-less starting point that carries the transport and hooks shared by
/// every request created from it.
///
/// Without a transport option, requests fall back to [`default_transport`]
/// when they are sent; the shared agent is not created before that.
#[derive(Clone)]
pub struct Builder {
    transport: Option<Arc<dyn Transport>>,
    before: Vec<BeforeHook>,
    after: Vec<AfterHook>,
}

impl Builder {
    /// Builder using the process-wide default transport.
    pub fn new() -> Self {
        Self {
            transport: None,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn from_options(options: impl IntoIterator<Item = BuilderOption>) -> Self {
        options
            .into_iter()
            .fold(Self::new(), |builder, option| builder.apply(option))
    }

    fn apply(mut self, option: BuilderOption) -> Self {
        match option {
            BuilderOption::Transport(transport) => self.transport = Some(transport),
            BuilderOption::Before(hook) => self.before.push(hook),
            BuilderOption::After(hook) => self.after.push(hook),
        }
        self
    }

    #[must_use]
    pub fn option(&self, option: BuilderOption) -> Self {
        self.clone().apply(option)
    }

    pub fn get(&self, url: impl Into<String>) -> GetBuilder {
        self.request(url)
    }

    pub fn post(&self, url: impl Into<String>) -> PostBuilder {
        self.request(url)
    }

    pub fn put(&self, url: impl Into<String>) -> PutBuilder {
        self.request(url)
    }

    pub fn patch(&self, url: impl Into<String>) -> PatchBuilder {
        self.request(url)
    }

    pub fn delete(&self, url: impl Into<String>) -> DeleteBuilder {
        self.request(url)
    }

    fn request<M: Method>(&self, url: impl Into<String>) -> RequestBuilder<M> {
        RequestBuilder {
            transport: self.transport.clone(),
            context: Context::background(),
            url: url.into(),
            headers: HeaderMap::new(),
            parameters: Values::new(),
            body: None,
            before: self.before.clone(),
            after: self.after.clone(),
            handlers: Vec::new(),
            invalid_header: None,
            method: PhantomData,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish_non_exhaustive()
    }
}

/// Header that failed validation; reported by `build`.
#[derive(Debug, Clone)]
struct InvalidHeader {
    name: String,
    reason: String,
}

/// HTTP request under construction.
///
/// ```no_run
/// use fluent_request::{json_handler, Condition, Target};
/// use serde_json::Value;
///
/// let users: Target<Value> = Target::new();
/// let problem: Target<Value> = Target::new();
///
/// fluent_request::get("https://api.github.com/users")
///     .add_parameter("per_page", "5")
///     .handle([
///         json_handler(&users).when(Condition::SUCCESS),
///         json_handler(&problem).when(Condition::CLIENT_ERROR),
///     ])?;
/// # Ok::<(), fluent_request::RequestError>(())
/// ```
#[must_use = "RequestBuilder does nothing until it is sent"]
pub struct RequestBuilder<M> {
    transport: Option<Arc<dyn Transport>>,
    context: Context,
    url: String,
    headers: HeaderMap,
    parameters: Values,
    body: Option<Bytes>,
    before: Vec<BeforeHook>,
    after: Vec<AfterHook>,
    handlers: Vec<ResponseHandler>,
    invalid_header: Option<InvalidHeader>,
    method: PhantomData<fn() -> M>,
}

impl<M> Clone for RequestBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            context: self.context.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            parameters: self.parameters.clone(),
            body: self.body.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            handlers: self.handlers.clone(),
            invalid_header: self.invalid_header.clone(),
            method: PhantomData,
        }
    }
}

impl<M: Method> fmt::Debug for RequestBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &M::METHOD)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl<M: Method> RequestBuilder<M> {
    pub fn method(&self) -> HttpMethod {
        M::METHOD
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn parameters(&self) -> &Values {
        &self.parameters
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn response_handlers(&self) -> &[ResponseHandler] {
        &self.handlers
    }

    pub fn context(&self, context: Context) -> Self {
        let mut dupe = self.clone();
        dupe.context = context;
        dupe
    }

    pub fn transport(&self, transport: Arc<dyn Transport>) -> Self {
        let mut dupe = self.clone();
        dupe.transport = Some(transport);
        dupe
    }

    /// Append a value for `key`, keeping any values already set.
    pub fn add_header(&self, key: &str, value: &str) -> Self {
        self.with_header(key, value, true)
    }

    /// Replace every value of `key` with `value`.
    pub fn set_header(&self, key: &str, value: &str) -> Self {
        self.with_header(key, value, false)
    }

    pub fn add_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut dupe = self.clone();
        dupe.parameters.add(key, value);
        dupe
    }

    pub fn set_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut dupe = self.clone();
        dupe.parameters.set(key, value);
        dupe
    }

    pub fn before<F>(&self, hook: F) -> Self
    where
        F: Fn(&mut HttpRequest) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let mut dupe = self.clone();
        dupe.before.push(Arc::new(hook));
        dupe
    }

    pub fn after<F>(&self, hook: F) -> Self
    where
        F: Fn(&mut HttpResponse) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let mut dupe = self.clone();
        dupe.after.push(Arc::new(hook));
        dupe
    }

    /// Register a response handler. Handlers run in registration order.
    pub fn handler(&self, handler: ResponseHandler) -> Self {
        let mut dupe = self.clone();
        dupe.handlers.push(handler);
        dupe
    }

    fn with_header(&self, key: &str, value: &str, append: bool) -> Self {
        let mut dupe = self.clone();
        if dupe.invalid_header.is_some() {
            return dupe;
        }

        match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                if append {
                    dupe.headers.append(name, value);
                } else {
                    dupe.headers.insert(name, value);
                }
            }
            (Err(e), _) => {
                dupe.invalid_header = Some(InvalidHeader {
                    name: key.to_string(),
                    reason: e.to_string(),
                });
            }
            (_, Err(e)) => {
                dupe.invalid_header = Some(InvalidHeader {
                    name: key.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        dupe
    }

    /// Set `name` only if the caller has not set it already.
    fn set_default_header(&mut self, name: HeaderName, value: &'static str) {
        if !self.headers.contains_key(&name) {
            self.headers.insert(name, HeaderValue::from_static(value));
        }
    }

    /// Finalize into an `HttpRequest`.
    ///
    /// Query parameters are appended to any query already present in the
    /// URL.
    ///
    /// # Errors
    ///
    /// `RequestError::InvalidHeader` for a header rejected earlier in the
    /// chain, `RequestError::InvalidUrl` if the URL does not parse.
    pub fn build(&self) -> Result<HttpRequest, RequestError> {
        if let Some(invalid) = &self.invalid_header {
            return Err(RequestError::InvalidHeader {
                name: invalid.name.clone(),
                reason: invalid.reason.clone(),
            });
        }

        let mut url = Url::parse(&self.url).map_err(|source| RequestError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if !self.parameters.is_empty() {
            url.query_pairs_mut().extend_pairs(self.parameters.iter());
        }

        Ok(HttpRequest {
            method: M::METHOD,
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
            context: self.context.clone(),
        })
    }

    /// Build and send the request, dispatching the response to the
    /// registered handlers.
    ///
    /// Without handlers the raw response is returned with its body unread and
    /// post-receive hooks are skipped.
    ///
    /// # Errors
    ///
    /// Any `RequestError`; see the variants for where in the sequence each
    /// one can occur.
    pub fn send(&self) -> Result<HttpResponse, RequestError> {
        let mut request = self.build()?;
        for hook in &self.before {
            hook(&mut request).map_err(RequestError::BeforeHook)?;
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let transport = self.transport.clone().unwrap_or_else(default_transport);
        let mut response = transport.execute(request)?;
        debug!(status = %response.status, "received response");

        if self.handlers.is_empty() {
            return Ok(response);
        }

        for hook in &self.after {
            if let Err(source) = hook(&mut response) {
                return Err(RequestError::AfterHook {
                    source,
                    response: Box::new(response),
                });
            }
        }

        let body = match response.body.buffer() {
            Ok(body) => body,
            Err(source) => {
                return Err(RequestError::Body {
                    source,
                    response: Box::new(response),
                })
            }
        };

        for (index, handler) in self.handlers.iter().enumerate() {
            trace!(index, status = %response.status, "dispatching response handler");
            let view = ResponseView::new(response.status, &response.headers, &body);
            if let Err(source) = handler.handle(&view) {
                return Err(RequestError::Handler {
                    index,
                    source,
                    response: Box::new(response),
                });
            }
        }

        Ok(response)
    }

    /// Send with the registered handlers followed by `handlers`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub fn handle(
        &self,
        handlers: impl IntoIterator<Item = ResponseHandler>,
    ) -> Result<HttpResponse, RequestError> {
        let mut dupe = self.clone();
        dupe.handlers.extend(handlers);
        dupe.send()
    }

    /// Send and decode the body as JSON.
    ///
    /// Sets `Accept: application/json` unless an `Accept` header is already
    /// present. Registered handlers run first.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), with the JSON decode failure reported as
    /// the last handler.
    pub fn json_response<T>(&self) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let target = Target::new();
        let mut dupe = self.clone();
        dupe.set_default_header(ACCEPT, MIME_TYPE_JSON);
        dupe.handlers.push(json_handler(&target));
        dupe.receive_into(&target)
    }

    /// Send and decode the body as XML.
    ///
    /// Sets `Accept: application/xml` unless an `Accept` header is already
    /// present.
    ///
    /// # Errors
    ///
    /// Same as [`json_response`](Self::json_response).
    pub fn xml_response<T>(&self) -> Result<T, RequestError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let target = Target::new();
        let mut dupe = self.clone();
        dupe.set_default_header(ACCEPT, MIME_TYPE_XML);
        dupe.handlers.push(xml_handler(&target));
        dupe.receive_into(&target)
    }

    fn receive_into<T>(&self, target: &Target<T>) -> Result<T, RequestError> {
        let response = self.send()?;
        target.take().ok_or(RequestError::NoValue {
            status: response.status,
        })
    }
}

impl<M: Payload> RequestBuilder<M> {
    /// Serialize `value` as the JSON body.
    ///
    /// Sets `Content-Type: application/json` unless one is already set.
    ///
    /// # Errors
    ///
    /// `RequestError::Encode` if `value` cannot be serialized.
    pub fn json_body<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self, RequestError> {
        let encoded = serde_json::to_vec(value).map_err(EncodeError::Json)?;
        let mut dupe = self.clone();
        dupe.body = Some(Bytes::from(encoded));
        dupe.set_default_header(CONTENT_TYPE, MIME_TYPE_JSON);
        Ok(dupe)
    }

    /// Serialize `value` as the XML body. The root element is named after
    /// the type.
    ///
    /// Sets `Content-Type: application/xml` unless one is already set.
    ///
    /// # Errors
    ///
    /// `RequestError::Encode` if `value` cannot be serialized.
    pub fn xml_body<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self, RequestError> {
        let encoded = quick_xml::se::to_string(value).map_err(EncodeError::Xml)?;
        let mut dupe = self.clone();
        dupe.body = Some(Bytes::from(encoded));
        dupe.set_default_header(CONTENT_TYPE, MIME_TYPE_XML);
        Ok(dupe)
    }

    /// Use `form` as an `application/x-www-form-urlencoded` body.
    pub fn form_body(&self, form: &Form) -> Self {
        let mut dupe = self.clone();
        dupe.body = Some(Bytes::from(form.encode()));
        dupe.set_default_header(CONTENT_TYPE, MIME_TYPE_FORM_URL_ENCODED);
        dupe
    }

    /// Raw body. No content type is set.
    pub fn body(&self, body: impl Into<Bytes>) -> Self {
        let mut dupe = self.clone();
        dupe.body = Some(body.into());
        dupe
    }
}

pub fn get(url: impl Into<String>) -> GetBuilder {
    Builder::new().get(url)
}

pub fn post(url: impl Into<String>) -> PostBuilder {
    Builder::new().post(url)
}

pub fn put(url: impl Into<String>) -> PutBuilder {
    Builder::new().put(url)
}

pub fn patch(url: impl Into<String>) -> PatchBuilder {
    Builder::new().patch(url)
}

pub fn delete(url: impl Into<String>) -> DeleteBuilder {
    Builder::new().delete(url)
}

pub fn get_with(
    url: impl Into<String>,
    options: impl IntoIterator<Item = BuilderOption>,
) -> GetBuilder {
    Builder::from_options(options).get(url)
}

pub fn post_with(
    url: impl Into<String>,
    options: impl IntoIterator<Item = BuilderOption>,
) -> PostBuilder {
    Builder::from_options(options).post(url)
}

pub fn put_with(
    url: impl Into<String>,
    options: impl IntoIterator<Item = BuilderOption>,
) -> PutBuilder {
    Builder::from_options(options).put(url)
}

pub fn patch_with(
    url: impl Into<String>,
    options: impl IntoIterator<Item = BuilderOption>,
) -> PatchBuilder {
    Builder::from_options(options).patch(url)
}

pub fn delete_with(
    url: impl Into<String>,
    options: impl IntoIterator<Item = BuilderOption>,
) -> DeleteBuilder {
    Builder::from_options(options).delete(url)
}
