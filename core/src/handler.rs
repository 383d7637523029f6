//! Response handlers: decode actions gated by status-code conditions.
//!
//! # Design
//! A handler pairs one decode function with an ordered list of conditions.
//! With no conditions the decode always runs. Otherwise every condition is
//! checked on its own and the decode runs once per condition that matches,
//! so `[OK, OK]` decodes twice on a 200.
//!
//! Handlers are cheap to clone and never mutated in place: `when` returns a
//! new handler and leaves the one it was called on untouched.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;

use crate::condition::Condition;
use crate::error::DecodeError;
use crate::http::ResponseView;

type DecodeFn = dyn Fn(&ResponseView<'_>) -> Result<(), DecodeError> + Send + Sync;

/// A decode action plus the conditions under which it runs.
#[derive(Clone)]
pub struct ResponseHandler {
    decode: Arc<DecodeFn>,
    conditions: Vec<Condition>,
}

impl ResponseHandler {
    /// Handler that runs `decode` for every response.
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&ResponseView<'_>) -> Result<(), DecodeError> + Send + Sync + 'static,
    {
        Self {
            decode: Arc::new(decode),
            conditions: Vec::new(),
        }
    }

    /// A copy of this handler with `condition` appended to its conditions.
    #[must_use]
    pub fn when(&self, condition: impl Into<Condition>) -> Self {
        let mut handler = self.clone();
        handler.conditions.push(condition.into());
        handler
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Run the decode for `response` according to the conditions.
    ///
    /// Returns the first decode error; remaining matches are skipped.
    pub fn handle(&self, response: &ResponseView<'_>) -> Result<(), DecodeError> {
        if self.conditions.is_empty() {
            return (self.decode)(response);
        }

        for condition in &self.conditions {
            if condition.matches(response.status) {
                (self.decode)(response)?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

/// Slot that a decoding handler writes its value into.
///
/// Clones share the slot: keep one clone, hand the other to a handler, and
/// read the value back once the request has been sent.
///
/// ```
/// use fluent_request::{json_handler, Target};
///
/// let users: Target<Vec<String>> = Target::new();
/// let handler = json_handler(&users);
/// # drop(handler);
/// assert!(!users.is_set());
/// ```
pub struct Target<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Target<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: T) {
        *self.lock() = Some(value);
    }

    /// Remove and return the stored value.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }
}

impl<T: Clone> Target<T> {
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T> Clone for Target<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Target<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Target<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&*self.lock()).finish()
    }
}

/// Handler that decodes the body as JSON into `target`.
pub fn json_handler<T>(target: &Target<T>) -> ResponseHandler
where
    T: DeserializeOwned + Send + 'static,
{
    let target = target.clone();
    ResponseHandler::new(move |response| {
        let value: T = serde_json::from_slice(response.body())?;
        target.set(value);
        Ok(())
    })
}

/// Handler that decodes the body as XML into `target`.
pub fn xml_handler<T>(target: &Target<T>) -> ResponseHandler
where
    T: DeserializeOwned + Send + 'static,
{
    let target = target.clone();
    ResponseHandler::new(move |response| {
        let value: T = quick_xml::de::from_reader(response.reader())?;
        target.set(value);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderMap, StatusCode};
    use serde::Deserialize;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> ResponseHandler {
        let counter = Arc::clone(counter);
        ResponseHandler::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn view<'a>(status: u16, headers: &'a HeaderMap, body: &'static [u8]) -> ResponseView<'a> {
        ResponseView::new(StatusCode::from_u16(status).unwrap(), headers, body)
    }

    #[test]
    fn unconditional_handler_always_fires() {
        let headers = HeaderMap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter);

        for status in [200, 302, 404, 503] {
            handler.handle(&view(status, &headers, b"")).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn repeated_condition_fires_once_per_match() {
        let headers = HeaderMap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter)
            .when(Condition::OK)
            .when(Condition::OK);

        handler.handle(&view(200, &headers, b"")).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unmatched_conditions_skip_decode() {
        let headers = HeaderMap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(&counter).when(Condition::SUCCESS);

        handler.handle(&view(500, &headers, b"")).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn when_leaves_original_untouched() {
        let counter = Arc::new(AtomicUsize::new(0));
        let base = counting_handler(&counter);
        let gated = base.when(Condition::NOT_FOUND);

        assert!(base.conditions().is_empty());
        assert_eq!(gated.conditions().len(), 1);
    }

    #[test]
    fn json_handler_fills_target() {
        #[derive(Debug, Deserialize, PartialEq, Clone)]
        struct User {
            login: String,
        }

        let headers = HeaderMap::new();
        let users: Target<Vec<User>> = Target::new();
        json_handler(&users)
            .handle(&view(200, &headers, br#"[{"login":"octocat"}]"#))
            .unwrap();

        assert_eq!(
            users.get(),
            Some(vec![User {
                login: "octocat".to_string()
            }])
        );
    }

    #[test]
    fn xml_handler_fills_target() {
        #[derive(Debug, Deserialize)]
        struct Note {
            to: String,
            body: String,
        }

        let headers = HeaderMap::new();
        let note: Target<Note> = Target::new();
        xml_handler(&note)
            .handle(&view(
                200,
                &headers,
                b"<note><to>Tove</to><body>Don't forget me</body></note>",
            ))
            .unwrap();

        let note = note.take().unwrap();
        assert_eq!(note.to, "Tove");
        assert_eq!(note.body, "Don't forget me");
    }

    #[test]
    fn decode_error_is_returned() {
        let headers = HeaderMap::new();
        let target: Target<serde_json::Value> = Target::new();
        let err = json_handler(&target)
            .handle(&view(200, &headers, b"{broken"))
            .unwrap_err();

        assert!(matches!(err, DecodeError::Json(_)));
        assert!(!target.is_set());
    }
}
