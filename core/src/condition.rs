//! Status-code predicates that gate response handlers.

use http::StatusCode;

/// Predicate over the status code of a received response.
///
/// Conditions are plain values: they hold no state and can be shared between
/// any number of handlers and requests.
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Matches exactly one status code.
    Status(StatusCode),
    /// Matches every code in `min..=max`.
    Range { min: u16, max: u16 },
    /// Matches whatever the function accepts.
    Custom(fn(StatusCode) -> bool),
}

impl Condition {
    pub const OK: Self = Self::Status(StatusCode::OK);
    pub const CREATED: Self = Self::Status(StatusCode::CREATED);
    pub const ACCEPTED: Self = Self::Status(StatusCode::ACCEPTED);
    pub const NO_CONTENT: Self = Self::Status(StatusCode::NO_CONTENT);
    pub const BAD_REQUEST: Self = Self::Status(StatusCode::BAD_REQUEST);
    pub const UNAUTHORIZED: Self = Self::Status(StatusCode::UNAUTHORIZED);
    pub const FORBIDDEN: Self = Self::Status(StatusCode::FORBIDDEN);
    pub const NOT_FOUND: Self = Self::Status(StatusCode::NOT_FOUND);
    pub const UNPROCESSABLE_ENTITY: Self = Self::Status(StatusCode::UNPROCESSABLE_ENTITY);
    pub const INTERNAL_SERVER_ERROR: Self = Self::Status(StatusCode::INTERNAL_SERVER_ERROR);
    pub const BAD_GATEWAY: Self = Self::Status(StatusCode::BAD_GATEWAY);

    /// 100 Continue through 103 Early Hints.
    pub const INFORMATIONAL: Self = Self::range(100, 103);
    /// 200 OK through 226 IM Used.
    pub const SUCCESS: Self = Self::range(200, 226);
    /// 300 Multiple Choices through 308 Permanent Redirect.
    pub const REDIRECTION: Self = Self::range(300, 308);
    /// 400 Bad Request through 451 Unavailable For Legal Reasons.
    pub const CLIENT_ERROR: Self = Self::range(400, 451);
    /// 500 Internal Server Error through 511 Network Authentication Required.
    pub const SERVER_ERROR: Self = Self::range(500, 511);

    pub const fn status(code: StatusCode) -> Self {
        Self::Status(code)
    }

    /// Inclusive range of status codes.
    pub const fn range(min: u16, max: u16) -> Self {
        Self::Range { min, max }
    }

    pub const fn custom(predicate: fn(StatusCode) -> bool) -> Self {
        Self::Custom(predicate)
    }

    pub fn matches(&self, status: StatusCode) -> bool {
        match *self {
            Condition::Status(code) => status == code,
            Condition::Range { min, max } => (min..=max).contains(&status.as_u16()),
            Condition::Custom(predicate) => predicate(status),
        }
    }
}

impl From<StatusCode> for Condition {
    fn from(code: StatusCode) -> Self {
        Self::Status(code)
    }
}

pub fn status_1xx() -> Condition {
    Condition::INFORMATIONAL
}

pub fn status_2xx() -> Condition {
    Condition::SUCCESS
}

pub fn status_3xx() -> Condition {
    Condition::REDIRECTION
}

pub fn status_4xx() -> Condition {
    Condition::CLIENT_ERROR
}

pub fn status_5xx() -> Condition {
    Condition::SERVER_ERROR
}
