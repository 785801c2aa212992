//! In-process stand-in for the remote HerSync REST service.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, task::JoinHandle};
use url::Url;

type Rejection = (StatusCode, Json<Value>);

#[derive(Debug, Default)]
pub struct FakeData {
    users: Vec<FakeUser>,
    issued_token: Option<String>,
    pub cycles: Vec<Value>,
    pub symptoms: Vec<Value>,
    pub reminders: Vec<Value>,
    pub notifications: Vec<Value>,
    pub read_requests: Vec<i64>,
    pub upcoming_fetches: usize,
    pub fail_deletes: bool,
    next_id: i64,
}

/// Record collections served with the same list/create/get/update/delete shape.
#[derive(Debug, Clone, Copy)]
enum Collection {
    Cycles,
    Symptoms,
    Reminders,
}

impl Collection {
    fn noun(self) -> &'static str {
        match self {
            Collection::Cycles => "Cycle",
            Collection::Symptoms => "Symptom",
            Collection::Reminders => "Reminder",
        }
    }
}

#[derive(Debug, Clone)]
struct FakeUser {
    id: i64,
    username: String,
    email: String,
    password: String,
}

impl FakeData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn records(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Cycles => &mut self.cycles,
            Collection::Symptoms => &mut self.symptoms,
            Collection::Reminders => &mut self.reminders,
        }
    }

    fn current_user(&self) -> Option<&FakeUser> {
        let token = self.issued_token.as_deref()?;
        self.users
            .iter()
            .find(|user| token == format!("token-{}", user.username))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    data: Arc<Mutex<FakeData>>,
}

impl FakeApi {
    pub fn add_user(&self, username: &str, password: &str) {
        let mut data = self.data.lock().unwrap();
        let id = data.next_id();
        data.users.push(FakeUser {
            id,
            username: username.into(),
            email: format!("{username}@example.org"),
            password: password.into(),
        });
    }

    pub fn add_cycle(&self, start: &str, end: Option<&str>) {
        let mut data = self.data.lock().unwrap();
        let id = data.next_id();
        data.cycles.push(json!({
            "id": id,
            "start_date": start,
            "end_date": end,
            "flow_intensity": "medium",
            "notes": null,
        }));
    }

    pub fn add_symptom(&self, date: &str, symptom_type: &str, severity: u8) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = data.next_id();
        data.symptoms.push(json!({
            "id": id,
            "date": date,
            "category": "Physical",
            "symptom_type": symptom_type,
            "severity": severity,
            "notes": null,
        }));
        id
    }

    pub fn add_reminder(&self, name: &str, time: &str) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = data.next_id();
        data.reminders.push(json!({
            "id": id,
            "name": name,
            "dosage": "1 tablet",
            "time": time,
            "frequency": "daily",
            "category": "General",
            "tags": [],
        }));
        id
    }

    /// Forgets the issued token, so every authorised route answers 401.
    pub fn revoke_token(&self) {
        self.data.lock().unwrap().issued_token = None;
    }

    pub fn fail_deletes(&self) {
        self.data.lock().unwrap().fail_deletes = true;
    }

    pub fn add_notification(&self, title: &str, scheduled_for: &str, is_read: bool) -> i64 {
        let mut data = self.data.lock().unwrap();
        let id = data.next_id();
        data.notifications.push(json!({
            "id": id,
            "title": title,
            "message": format!("{title} now"),
            "scheduled_for": scheduled_for,
            "is_read": is_read,
        }));
        id
    }

    pub fn notification_id(&self, title: &str) -> Option<i64> {
        let data = self.data.lock().unwrap();
        data.notifications
            .iter()
            .find(|n| n["title"] == title)
            .and_then(|n| n["id"].as_i64())
    }

    /// Id of the first record in `collection` (`cycles`, `symptoms` or
    /// `reminders`) whose `field` equals `value`.
    pub fn record_id(&self, collection: &str, field: &str, value: &str) -> Option<i64> {
        let mut data = self.data.lock().unwrap();
        let records = match collection {
            "cycles" => data.records(Collection::Cycles),
            "symptoms" => data.records(Collection::Symptoms),
            "reminders" => data.records(Collection::Reminders),
            _ => return None,
        };
        records
            .iter()
            .find(|r| r[field] == value)
            .and_then(|r| r["id"].as_i64())
    }

    pub fn with<T>(&self, f: impl FnOnce(&FakeData) -> T) -> T {
        f(&self.data.lock().unwrap())
    }
}

pub struct FakeServer {
    pub base: Url,
    pub api: FakeApi,
    task: JoinHandle<()>,
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn(api: FakeApi) -> anyhow::Result<FakeServer> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let base = Url::parse(&format!("http://{}", listener.local_addr()?))?;
    let app = router(api.clone());
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(FakeServer { base, api, task })
}

fn router(api: FakeApi) -> Router {
    Router::new()
        .route("/login/", post(login))
        .route("/users/profile", get(profile))
        .route("/dashboard", get(dashboard))
        .merge(records("/cycles", Collection::Cycles))
        .merge(records("/symptoms", Collection::Symptoms))
        .merge(records("/reminders/medications", Collection::Reminders))
        .route("/notifications/upcoming", get(upcoming))
        .route("/notifications/all", get(all_notifications))
        .route("/notifications/:id/read", post(mark_read))
        .route("/notifications/:id/snooze", post(snooze))
        .with_state(api)
}

fn records(path: &str, collection: Collection) -> Router<FakeApi> {
    Router::new()
        .route(
            path,
            get(move |api: State<FakeApi>, headers: HeaderMap| list_records(api, headers, collection))
                .post(move |api: State<FakeApi>, headers: HeaderMap, body: Json<Value>| {
                    create_record(api, headers, body, collection)
                }),
        )
        .route(
            &format!("{path}/:id"),
            get(move |api: State<FakeApi>, headers: HeaderMap, id: Path<i64>| {
                get_record(api, headers, id, collection)
            })
            .put(
                move |api: State<FakeApi>, headers: HeaderMap, id: Path<i64>, body: Json<Value>| {
                    update_record(api, headers, id, body, collection)
                },
            )
            .delete(move |api: State<FakeApi>, headers: HeaderMap, id: Path<i64>| {
                delete_record(api, headers, id, collection)
            }),
        )
}

fn reject(status: StatusCode, msg: &str) -> Rejection {
    (status, Json(json!({ "msg": msg })))
}

fn authorize(data: &FakeData, headers: &HeaderMap) -> Result<(), Rejection> {
    let expected = data
        .issued_token
        .as_deref()
        .map(|token| format!("Bearer {token}"));
    let sent = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match (expected, sent) {
        (Some(expected), Some(sent)) if expected == sent => Ok(()),
        _ => Err(reject(StatusCode::UNAUTHORIZED, "Missing or invalid token")),
    }
}

async fn login(State(api): State<FakeApi>, Json(body): Json<Value>) -> Result<Response, Rejection> {
    let mut data = api.data.lock().unwrap();
    let identifier = body["username"]
        .as_str()
        .or_else(|| body["email"].as_str())
        .unwrap_or_default()
        .to_string();
    let password = body["password"].as_str().unwrap_or_default();
    let user = data
        .users
        .iter()
        .find(|u| (u.username == identifier || u.email == identifier) && u.password == password)
        .cloned()
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid username or password"))?;
    let token = format!("token-{}", user.username);
    data.issued_token = Some(token.clone());
    Ok(Json(json!({
        "access_token": token,
        "user": { "id": user.id, "username": user.username, "email": user.email },
    }))
    .into_response())
}

async fn profile(State(api): State<FakeApi>, headers: HeaderMap) -> Result<Json<Value>, Rejection> {
    let data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    let user = data
        .current_user()
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unknown user"))?;
    Ok(Json(json!({ "id": user.id, "username": user.username, "email": user.email })))
}

async fn dashboard(State(api): State<FakeApi>, headers: HeaderMap) -> Result<Json<Value>, Rejection> {
    let data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    let user = data
        .current_user()
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unknown user"))?;
    Ok(Json(json!({
        "name": user.username,
        "email": user.email,
        "cycleLength": 28,
        "cycleLogs": data.cycles,
        "symptoms": [],
        "reminders": [],
        "insights": [],
    })))
}

async fn list_records(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    collection: Collection,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    Ok(Json(Value::Array(data.records(collection).clone())))
}

async fn create_record(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
    collection: Collection,
) -> Result<(StatusCode, Json<Value>), Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    let id = data.next_id();
    body["id"] = json!(id);
    data.records(collection).push(body);
    let msg = format!("{} added", collection.noun());
    Ok((StatusCode::CREATED, Json(json!({ "msg": msg }))))
}

async fn get_record(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    collection: Collection,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    let missing = format!("{} not found", collection.noun());
    data.records(collection)
        .iter()
        .find(|r| r["id"].as_i64() == Some(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, &missing))
}

async fn update_record(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(mut body): Json<Value>,
    collection: Collection,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    body["id"] = json!(id);
    let missing = format!("{} not found", collection.noun());
    let record = data
        .records(collection)
        .iter_mut()
        .find(|r| r["id"].as_i64() == Some(id))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, &missing))?;
    *record = body;
    Ok(Json(json!({ "msg": format!("{} updated", collection.noun()) })))
}

async fn delete_record(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    collection: Collection,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    if data.fail_deletes {
        return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"));
    }
    data.records(collection).retain(|r| r["id"].as_i64() != Some(id));
    Ok(Json(json!({ "msg": format!("{} deleted", collection.noun()) })))
}

async fn upcoming(State(api): State<FakeApi>, headers: HeaderMap) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    data.upcoming_fetches += 1;
    let unread = data
        .notifications
        .iter()
        .filter(|n| n["is_read"] == false)
        .cloned()
        .collect();
    Ok(Json(Value::Array(unread)))
}

async fn all_notifications(
    State(api): State<FakeApi>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    let data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    Ok(Json(Value::Array(data.notifications.clone())))
}

async fn mark_read(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    data.read_requests.push(id);
    for item in data.notifications.iter_mut() {
        if item["id"].as_i64() == Some(id) {
            item["is_read"] = json!(true);
        }
    }
    Ok(Json(json!({ "msg": "Marked as read" })))
}

async fn snooze(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    let mut data = api.data.lock().unwrap();
    authorize(&data, &headers)?;
    let minutes = body["minutes"].as_i64().unwrap_or(60);
    let until = (chrono::Utc::now() + chrono::Duration::minutes(minutes)).to_rfc3339();
    for item in data.notifications.iter_mut() {
        if item["id"].as_i64() == Some(id) {
            item["scheduled_for"] = json!(until);
        }
    }
    Ok(Json(json!({ "msg": "Snoozed" })))
}
