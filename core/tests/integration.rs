//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every builder
//! operation over real HTTP through `UreqTransport`. Validates header and
//! query encoding, body encodings, conditional handlers and the context
//! deadline with an actual server on the other end.

#![cfg(feature = "ureq")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fluent_request::{
    json_handler, post, xml_handler, Builder, BuilderOption, Condition, Context, Form,
    HttpRequest, HttpResponse, RequestError, Target, Transport, TransportConfig,
    TransportError, UreqTransport,
};
use http::StatusCode;
use mock_server::{Echo, Problem, Token, User};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct NewUser<'a> {
    name: &'a str,
    admin: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Note {
    to: String,
    from: String,
    body: String,
}

#[derive(Serialize)]
struct Reminder {
    to: String,
    text: String,
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client() -> Builder {
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new());
    Builder::from_options([BuilderOption::transport(transport)])
}

#[test]
fn user_lifecycle() {
    let base = start_server();
    let api = client();

    // Step 1: list is empty.
    let users: Vec<User> = api.get(format!("{base}/users")).json_response().unwrap();
    assert!(users.is_empty(), "expected empty list");

    // Step 2: create two users.
    let created = Target::new();
    let response = api
        .post(format!("{base}/users"))
        .json_body(&NewUser {
            name: "Alice",
            admin: false,
        })
        .unwrap()
        .handle([json_handler(&created).when(Condition::CREATED)])
        .unwrap();
    assert_eq!(response.status, StatusCode::CREATED);
    let alice: User = created.take().unwrap();
    assert_eq!(alice.name, "Alice");

    let bob: User = api
        .post(format!("{base}/users"))
        .json_body(&NewUser {
            name: "Bob",
            admin: true,
        })
        .unwrap()
        .json_response()
        .unwrap();
    assert!(bob.admin);

    // Step 3: paging parameter reaches the server.
    let page: Vec<User> = api
        .get(format!("{base}/users"))
        .set_parameter("page_size", "1")
        .json_response()
        .unwrap();
    assert_eq!(page, [alice.clone()]);

    // Step 4: partial and full update.
    let patched: User = api
        .patch(format!("{base}/users/{}", alice.id))
        .json_body(&serde_json::json!({ "admin": true }))
        .unwrap()
        .json_response()
        .unwrap();
    assert!(patched.admin);

    let renamed: User = api
        .put(format!("{base}/users/{}", alice.id))
        .json_body(&serde_json::json!({ "name": "Alicia" }))
        .unwrap()
        .json_response()
        .unwrap();
    assert_eq!(renamed.name, "Alicia");

    // Step 5: delete, then the user is gone.
    let response = api
        .delete(format!("{base}/users/{}", bob.id))
        .send()
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let user = Target::<User>::new();
    let problem = Target::<Problem>::new();
    let response = api
        .get(format!("{base}/users/{}", bob.id))
        .handle([
            json_handler(&user).when(Condition::SUCCESS),
            json_handler(&problem).when(Condition::NOT_FOUND),
        ])
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!user.is_set());
    assert_eq!(problem.take().unwrap().message, "user not found");
}

#[test]
fn headers_and_parameters_reach_the_server() {
    let base = start_server();

    let echo: Echo = client()
        .get(format!("{base}/echo?lang=en"))
        .add_header("X-Trace", "one")
        .add_header("x-trace", "two")
        .set_header("authorization", "Bearer abc")
        .add_parameter("tag", "a b")
        .add_parameter("tag", "c&d")
        .add_parameter("page", "2")
        .json_response()
        .unwrap();

    assert_eq!(echo.method, "GET");
    assert_eq!(echo.query.as_deref(), Some("lang=en&page=2&tag=a+b&tag=c%26d"));
    assert_eq!(echo.headers["x-trace"], ["one", "two"]);
    assert_eq!(echo.headers["authorization"], ["Bearer abc"]);
    assert_eq!(echo.headers["accept"], ["application/json"]);
}

#[test]
fn form_body_is_url_encoded() {
    let base = start_server();
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new());

    let token: Token = post(format!("{base}/login"))
        .transport(Arc::clone(&transport))
        .form_body(&Form::new().add("username", "alice").add("password", "hunter2"))
        .json_response()
        .unwrap();
    assert_eq!(token.access_token, "token-for-alice");
    assert_eq!(token.token_type, "Bearer");

    let echo: Echo = post(format!("{base}/echo"))
        .transport(transport)
        .form_body(&Form::new().add("q", "rust & go").add("a", "1"))
        .json_response()
        .unwrap();
    assert_eq!(echo.body, "a=1&q=rust+%26+go");
    assert_eq!(
        echo.headers["content-type"],
        ["application/x-www-form-urlencoded"]
    );
}

#[test]
fn xml_round_trip() {
    let base = start_server();
    let api = client();

    let note: Note = api.get(format!("{base}/notes/1")).xml_response().unwrap();
    assert_eq!(note.to, "Tove");
    assert_eq!(note.from, "Jani");
    assert_eq!(note.body, "Don't forget me this weekend!");

    let echo: Echo = api
        .put(format!("{base}/echo"))
        .xml_body(&Reminder {
            to: "Jani".to_string(),
            text: "call back".to_string(),
        })
        .unwrap()
        .json_response()
        .unwrap();
    assert_eq!(
        echo.body,
        "<Reminder><to>Jani</to><text>call back</text></Reminder>"
    );
    assert_eq!(echo.headers["content-type"], ["application/xml"]);

    let found = Target::<Note>::new();
    let response = api
        .get(format!("{base}/notes/2"))
        .handle([xml_handler(&found).when(Condition::OK)])
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!found.is_set());
}

#[test]
fn error_statuses_are_responses_not_errors() {
    let base = start_server();
    let api = client();

    for code in [400u16, 401, 500, 503] {
        let client_error = Target::<Problem>::new();
        let server_error = Target::<Problem>::new();

        let response = api
            .get(format!("{base}/status/{code}"))
            .handle([
                json_handler(&client_error).when(Condition::CLIENT_ERROR),
                json_handler(&server_error).when(Condition::SERVER_ERROR),
            ])
            .unwrap();

        assert_eq!(response.status.as_u16(), code);
        let problem = if code < 500 {
            assert!(!server_error.is_set());
            client_error.take()
        } else {
            assert!(!client_error.is_set());
            server_error.take()
        };
        assert_eq!(problem.unwrap().status, code);
    }
}

#[test]
fn hooks_see_request_and_response() {
    let base = start_server();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (before_log, after_log) = (Arc::clone(&seen), Arc::clone(&seen));

    let echo: Echo = client()
        .get(format!("{base}/echo"))
        .before(move |req: &mut HttpRequest| {
            before_log.lock().unwrap().push(format!("{} {}", req.method, req.url.path()));
            req.headers.insert(
                "x-signature",
                http::HeaderValue::from_static("signed"),
            );
            Ok(())
        })
        .after(move |res: &mut HttpResponse| {
            after_log.lock().unwrap().push(res.status.as_u16().to_string());
            Ok(())
        })
        .json_response()
        .unwrap();

    assert_eq!(echo.headers["x-signature"], ["signed"]);
    assert_eq!(*seen.lock().unwrap(), ["GET /echo", "200"]);
}

#[test]
fn raw_send_returns_unread_body() {
    let base = start_server();

    let mut response = client().get(format!("{base}/notes/1")).send().unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.body.is_buffered());
    assert_eq!(
        response.headers[http::header::CONTENT_TYPE],
        "application/xml"
    );
    assert!(response.text().unwrap().starts_with("<note>"));
}

#[test]
fn invalid_url_makes_no_call() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let transport: Arc<dyn Transport> = Arc::new(
        move |req: HttpRequest| -> Result<HttpResponse, TransportError> {
            *counter.lock().unwrap() += 1;
            UreqTransport::new().execute(req)
        },
    );

    let err = fluent_request::get_with("http//missing-colon", [BuilderOption::transport(transport)])
        .send()
        .unwrap_err();

    assert!(matches!(err, RequestError::InvalidUrl { .. }));
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn context_deadline_bounds_the_call() {
    let base = start_server();

    let ctx = Context::background().with_timeout(Duration::from_millis(100));
    let err = client()
        .get(format!("{base}/slow"))
        .add_parameter("ms", "2000")
        .context(ctx)
        .send()
        .unwrap_err();
    assert!(
        matches!(
            err,
            RequestError::Transport(TransportError::DeadlineExceeded)
        ),
        "unexpected error: {err:?}"
    );

    let ctx = Context::background();
    ctx.cancel();
    let err = client()
        .get(format!("{base}/users"))
        .context(ctx)
        .send()
        .unwrap_err();
    assert!(matches!(
        err,
        RequestError::Transport(TransportError::Cancelled)
    ));
}

#[test]
fn configured_timeout_caps_a_longer_context_deadline() {
    let base = start_server();
    let config = TransportConfig {
        timeout: Some(Duration::from_millis(100)),
        ..TransportConfig::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::with_config(&config));

    let started = std::time::Instant::now();
    let err = fluent_request::get_with(format!("{base}/slow"), [BuilderOption::transport(transport)])
        .add_parameter("ms", "1500")
        .context(Context::background().with_timeout(Duration::from_secs(30)))
        .send()
        .unwrap_err();

    assert!(
        matches!(
            err,
            RequestError::Transport(TransportError::DeadlineExceeded)
        ),
        "unexpected error: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[test]
fn configured_transport_sends_user_agent() {
    let base = start_server();
    let config = TransportConfig {
        user_agent: "integration-suite/1.0".to_string(),
        ..TransportConfig::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::with_config(&config));

    let echo: Echo = fluent_request::get_with(format!("{base}/echo"), [BuilderOption::transport(transport)])
        .json_response()
        .unwrap();

    assert_eq!(echo.headers["user-agent"], ["integration-suite/1.0"]);
}
