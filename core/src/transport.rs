//! The network seam: turning an `HttpRequest` into an `HttpResponse`.
//!
//! # Design
//! The builder never performs I/O itself. It hands the finalized request to a
//! [`Transport`] and works with whatever comes back, so tests (and hosts with
//! their own HTTP stack) can plug in any implementation, including plain
//! closures. The default transport is a blocking `ureq` agent behind the
//! `ureq` feature.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Default User-Agent string sent by [`UreqTransport`].
pub const DEFAULT_USER_AGENT: &str = concat!("fluent-request/", env!("CARGO_PKG_VERSION"));

/// Executes one request and returns the response or a transport failure.
///
/// Implementations must report HTTP error statuses as ordinary responses;
/// only failures to obtain a response at all are errors.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Settings for the default transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound for a whole call, applied when the request context has no
    /// tighter deadline.
    #[serde(with = "duration_secs")]
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub max_redirects: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

/// Transport shared by every builder created without an explicit one.
pub fn default_transport() -> Arc<dyn Transport> {
    static DEFAULT: OnceLock<Arc<dyn Transport>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| {
        #[cfg(feature = "ureq")]
        {
            Arc::new(UreqTransport::new())
        }
        #[cfg(not(feature = "ureq"))]
        {
            Arc::new(Unavailable)
        }
    }))
}

#[cfg(not(feature = "ureq"))]
struct Unavailable;

#[cfg(not(feature = "ureq"))]
impl Transport for Unavailable {
    fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Unavailable)
    }
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::UreqTransport;

#[cfg(feature = "ureq")]
mod ureq_transport {
    use std::time::Duration;

    use http::HeaderMap;
    use tracing::trace;

    use super::{Transport, TransportConfig};
    use crate::error::TransportError;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};

    /// Blocking transport backed by a `ureq::Agent`.
    ///
    /// HTTP error statuses come back as responses. The request context is
    /// honoured before the call (cancellation, expired deadline). Its
    /// remaining time bounds the call, but never beyond the configured
    /// `TransportConfig::timeout`.
    #[derive(Debug, Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
        timeout: Option<Duration>,
    }

    impl UreqTransport {
        pub fn new() -> Self {
            Self::with_config(&TransportConfig::default())
        }

        pub fn with_config(config: &TransportConfig) -> Self {
            let agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(config.timeout)
                .user_agent(config.user_agent.as_str())
                .max_redirects(config.max_redirects)
                .build()
                .new_agent();
            Self {
                agent,
                timeout: config.timeout,
            }
        }

        /// Wrap an existing agent. It should be configured with
        /// `http_status_as_error(false)` so status codes reach the handlers.
        /// Context deadlines still apply; the agent's own timeouts are left
        /// as configured.
        pub fn from_agent(agent: ureq::Agent) -> Self {
            Self {
                agent,
                timeout: None,
            }
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    /// The tighter of the configured timeout and the time left on the
    /// context. `None` when neither is set.
    pub(super) fn effective_timeout(
        configured: Option<Duration>,
        remaining: Option<Duration>,
    ) -> Option<Duration> {
        match (configured, remaining) {
            (Some(configured), Some(remaining)) => Some(configured.min(remaining)),
            (configured, remaining) => configured.or(remaining),
        }
    }

    fn with_headers<B>(
        mut builder: ureq::RequestBuilder<B>,
        headers: &HeaderMap,
    ) -> ureq::RequestBuilder<B> {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        builder
    }

    fn with_timeout<B>(
        builder: ureq::RequestBuilder<B>,
        timeout: Option<Duration>,
    ) -> ureq::RequestBuilder<B> {
        match timeout {
            Some(timeout) => builder.config().timeout_global(Some(timeout)).build(),
            None => builder,
        }
    }

    impl UreqTransport {
        fn prepare<B>(
            &self,
            builder: ureq::RequestBuilder<B>,
            request: &HttpRequest,
        ) -> ureq::RequestBuilder<B> {
            let builder = with_headers(builder, &request.headers);
            // Only a context deadline needs a per-call override; otherwise the
            // agent's configured timeout already applies.
            match request.context.remaining() {
                Some(left) => with_timeout(builder, effective_timeout(self.timeout, Some(left))),
                None => builder,
            }
        }
    }

    impl Transport for UreqTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            if request.context.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            if request.context.is_expired() {
                return Err(TransportError::DeadlineExceeded);
            }

            let url = request.url.as_str();
            trace!(method = %request.method, url, "ureq call");

            let response = match request.method {
                HttpMethod::Get => self.prepare(self.agent.get(url), &request).call(),
                HttpMethod::Delete => self.prepare(self.agent.delete(url), &request).call(),
                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                    let builder = match request.method {
                        HttpMethod::Put => self.agent.put(url),
                        HttpMethod::Patch => self.agent.patch(url),
                        _ => self.agent.post(url),
                    };
                    let builder = self.prepare(builder, &request);
                    match &request.body {
                        Some(body) => builder.send(&body[..]),
                        None => builder.send_empty(),
                    }
                }
            }
            .map_err(|err| match err {
                ureq::Error::Timeout(_) => TransportError::DeadlineExceeded,
                other => TransportError::Ureq(other),
            })?;

            let (parts, body) = response.into_parts();
            Ok(HttpResponse {
                status: parts.status,
                headers: parts.headers,
                body: ResponseBody::from_reader(body.into_reader()),
            })
        }
    }
}
