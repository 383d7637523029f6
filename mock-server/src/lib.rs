use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub admin: bool,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub admin: Option<bool>,
}

/// Error body returned for every 4xx/5xx produced by the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
    pub status: u16,
    pub message: String,
}

/// Everything the server saw about an `/echo` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize)]
pub struct Paging {
    pub page_size: Option<usize>,
}

#[derive(Deserialize)]
pub struct Delay {
    pub ms: Option<u64>,
}

#[derive(Default)]
pub struct Store {
    users: RwLock<HashMap<u64, User>>,
    next_id: AtomicU64,
}

pub type Db = Arc<Store>;

pub fn app() -> Router {
    let db: Db = Arc::new(Store::default());
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .route("/login", post(login))
        .route("/notes/{id}", get(get_note))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn problem(status: StatusCode, message: &str) -> Response {
    let body = Problem {
        status: status.as_u16(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn list_users(State(db): State<Db>, Query(paging): Query<Paging>) -> Json<Vec<User>> {
    let users = db.users.read().await;
    let mut list: Vec<User> = users.values().cloned().collect();
    list.sort_by_key(|user| user.id);
    if let Some(size) = paging.page_size {
        list.truncate(size);
    }
    Json(list)
}

async fn create_user(State(db): State<Db>, Json(input): Json<CreateUser>) -> Response {
    if input.name.trim().is_empty() {
        return problem(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty");
    }
    let user = User {
        id: db.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        name: input.name,
        admin: input.admin,
    };
    db.users.write().await.insert(user.id, user.clone());
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_user(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let users = db.users.read().await;
    match users.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => problem(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateUser>,
) -> Response {
    let mut users = db.users.write().await;
    let Some(user) = users.get_mut(&id) else {
        return problem(StatusCode::NOT_FOUND, "user not found");
    };
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(admin) = input.admin {
        user.admin = admin;
    }
    Json(user.clone()).into_response()
}

async fn delete_user(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    match db.users.write().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => problem(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn login(Form(login): Form<Login>) -> Response {
    if login.password != "hunter2" {
        return problem(StatusCode::UNAUTHORIZED, "bad credentials");
    }
    Json(Token {
        access_token: format!("token-for-{}", login.username),
        token_type: "Bearer".to_string(),
    })
    .into_response()
}

async fn get_note(Path(id): Path<u64>) -> Response {
    if id != 1 {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/xml")],
            "<problem><status>404</status><message>note not found</message></problem>",
        )
            .into_response();
    }
    (
        [(header::CONTENT_TYPE, "application/xml")],
        "<note><to>Tove</to><from>Jani</from><body>Don't forget me this weekend!</body></note>",
    )
        .into_response()
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => problem(status, status.canonical_reason().unwrap_or("unknown")),
        Err(_) => problem(StatusCode::BAD_REQUEST, "invalid status code"),
    }
}

async fn slow(Query(delay): Query<Delay>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(delay.ms.unwrap_or(500))).await;
    "done"
}
