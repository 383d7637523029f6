//! Type-level HTTP methods for `RequestBuilder`.
//!
//! The marker picks which operations a builder exposes: every method gets the
//! common header/parameter/hook operations, and only the [`Payload`] methods
//! (`Post`, `Put`, `Patch`) get the body setters.

use crate::http::HttpMethod;

mod sealed {
    pub trait Sealed {}
}

/// An HTTP method known at compile time.
pub trait Method: sealed::Sealed {
    const METHOD: HttpMethod;
}

/// Methods whose requests may carry a body.
pub trait Payload: Method {}

macro_rules! method_marker {
    ($(#[$doc:meta])* $name:ident => $method:ident $(, $payload:ident)?) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $name {}

        impl sealed::Sealed for $name {}

        impl Method for $name {
            const METHOD: HttpMethod = HttpMethod::$method;
        }

        $(impl $payload for $name {})?
    };
}

method_marker!(
    /// `GET`: no body.
    Get => Get
);
method_marker!(
    /// `POST`: accepts a body.
    Post => Post, Payload
);
method_marker!(
    /// `PUT`: accepts a body.
    Put => Put, Payload
);
method_marker!(
    /// `PATCH`: accepts a body.
    Patch => Patch, Payload
);
method_marker!(
    /// `DELETE`: no body.
    Delete => Delete
);
