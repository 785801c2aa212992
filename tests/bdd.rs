mod fake_api;

use std::{fmt, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cucumber::{given, then, when, World as _};
use fake_api::{FakeApi, FakeServer};
use hersync::{
    config::AppConfig,
    db::{init_pool, run_migrations},
    models::{session::PersistedSession, user::UserProfile},
    routes::create_router,
    services::{
        notifications::{FetchOutcome, PollerState},
        session::SESSION_KEY,
    },
    state::AppState,
};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    response: Option<PageResponse>,
    login_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    outcome: Option<FetchOutcome>,
    pending_delete: Option<String>,
    upcoming_before: Option<usize>,
}

#[derive(Debug)]
struct PageResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn fake(&self) -> &FakeApi {
        &self.state.as_ref().expect("state must be initialised first").server.api
    }

    fn page(&self) -> &PageResponse {
        self.response.as_ref().expect("no request has been made yet")
    }

    async fn request(&mut self, request: Request<Body>) {
        let app = create_router(self.app_state().clone());
        let response = app.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        self.response = Some(PageResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    async fn get(&mut self, uri: &str) {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        self.request(request).await;
    }

    async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");
        self.request(request).await;
    }

    async fn stored_session(&self) -> Option<PersistedSession> {
        let raw = self
            .app_state()
            .storage
            .get_item(SESSION_KEY)
            .await
            .expect("read storage")?;
        Some(serde_json::from_str(&raw).expect("stored session parses"))
    }
}

struct TestState {
    app: AppState,
    server: FakeServer,
    follower: JoinHandle<()>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState")
            .field("api", &self.server.base.as_str())
            .finish()
    }
}

impl Drop for TestState {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());

        let server = fake_api::spawn(FakeApi::default()).await?;

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            api_base: server.base.clone(),
            api_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(30),
            snooze_minutes: 60,
            cookie_secret: "bdd-cookie-secret".into(),
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let app = AppState::new(config, db)?;
        let follower = app.poller.follow_session(app.session.subscribe());
        Ok(Self {
            app,
            server,
            follower,
            _root: root,
        })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

async fn wait_for_poller(world: &AppWorld, wanted: PollerState) {
    let mut state = world.app_state().poller.watch_state();
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == wanted))
        .await
        .expect("poller did not change state in time")
        .expect("poller state channel closed");
}

// Setup

#[given(regex = r#"^a HerSync service with user "([^"]+)" and password "([^"]+)"$"#)]
async fn given_service_with_user(world: &mut AppWorld, username: String, password: String) {
    world.state = Some(TestState::new().await.expect("state"));
    world.fake().add_user(&username, &password);
}

#[given(regex = r#"^I am logged in as "([^"]+)" with password "([^"]+)"$"#)]
async fn given_logged_in(world: &mut AppWorld, username: String, password: String) {
    world
        .post_form("/login", &[("identifier", username.as_str()), ("password", password.as_str())])
        .await;
    assert_eq!(world.page().status, StatusCode::SEE_OTHER, "{}", world.page().body);
    wait_for_poller(world, PollerState::Polling).await;
    // The first tick fetches right away; later ones are 30 s apart.
    let fake = world.fake().clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while fake.with(|data| data.upcoming_fetches) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first notification poll did not happen");
}

#[given(regex = r#"^I logged in as "([^"]+)" (\d+) days ago$"#)]
async fn given_old_login(world: &mut AppWorld, username: String, days: i64) {
    let user = UserProfile {
        id: 1,
        username: username.clone(),
        email: format!("{username}@example.org"),
        profile_photo: None,
    };
    world
        .app_state()
        .session
        .set_at(user, format!("token-{username}"), Utc::now() - ChronoDuration::days(days))
        .await
        .expect("store old session");
}

#[given(regex = r#"^a stored session for "([^"]+)" that expired (\d+) minutes? ago$"#)]
async fn given_expired_session(world: &mut AppWorld, username: String, minutes: i64) {
    let session = PersistedSession {
        token: format!("token-{username}"),
        expiry: Utc::now() - ChronoDuration::minutes(minutes),
        user: UserProfile {
            id: 1,
            username,
            email: String::new(),
            profile_photo: None,
        },
    };
    let raw = serde_json::to_string(&session).expect("serialize session");
    world
        .app_state()
        .storage
        .set_item(SESSION_KEY, &raw)
        .await
        .expect("write session");
}

#[given(regex = r#"^the service has a cycle from "([^"]+)" to "([^"]+)"$"#)]
async fn given_cycle(world: &mut AppWorld, start: String, end: String) {
    world.fake().add_cycle(&start, Some(&end));
}

#[given(regex = r#"^the service has a symptom "([^"]+)" on "([^"]+)" with severity (\d)$"#)]
async fn given_symptom(world: &mut AppWorld, symptom_type: String, date: String, severity: u8) {
    world.fake().add_symptom(&date, &symptom_type, severity);
}

#[given(regex = r#"^the service has a reminder "([^"]+)" at "([^"]+)"$"#)]
async fn given_reminder(world: &mut AppWorld, name: String, time: String) {
    world.fake().add_reminder(&name, &time);
}

#[given("the service no longer accepts my token")]
async fn given_token_revoked(world: &mut AppWorld) {
    world.fake().revoke_token();
}

#[given("the service fails every delete")]
async fn given_failing_deletes(world: &mut AppWorld) {
    world.fake().fail_deletes();
}

#[given(regex = r#"^the service has an unread notification "([^"]+)" due in (\d+) seconds$"#)]
async fn given_due_notification(world: &mut AppWorld, title: String, seconds: i64) {
    let at = (Utc::now() + ChronoDuration::seconds(seconds)).to_rfc3339();
    world.fake().add_notification(&title, &at, false);
}

#[given(regex = r#"^the service has an unread notification "([^"]+)" due in (\d+) hours$"#)]
async fn given_later_notification(world: &mut AppWorld, title: String, hours: i64) {
    let at = (Utc::now() + ChronoDuration::hours(hours)).to_rfc3339();
    world.fake().add_notification(&title, &at, false);
}

#[given(regex = r#"^the service has a read notification "([^"]+)"$"#)]
async fn given_read_notification(world: &mut AppWorld, title: String) {
    let at = (Utc::now() - ChronoDuration::hours(2)).to_rfc3339();
    world.fake().add_notification(&title, &at, true);
}

// Actions

#[when(regex = r#"^I log in as "([^"]+)" with password "([^"]+)"$"#)]
async fn when_log_in(world: &mut AppWorld, username: String, password: String) {
    let before = Utc::now();
    world
        .post_form("/login", &[("identifier", username.as_str()), ("password", password.as_str())])
        .await;
    world.login_window = Some((before, Utc::now()));
}

#[when("the application restores the session")]
async fn when_restore(world: &mut AppWorld) {
    world
        .app_state()
        .session
        .restore()
        .await
        .expect("restore session");
}

#[when(regex = r#"^I open "([^"]+)"$"#)]
async fn when_open(world: &mut AppWorld, uri: String) {
    world.get(&uri).await;
}

#[when("I log out")]
async fn when_log_out(world: &mut AppWorld) {
    world.post_form("/logout", &[]).await;
}

#[when(regex = r#"^I submit a cycle from "([^"]*)" to "([^"]*)"$"#)]
async fn when_submit_cycle(world: &mut AppWorld, start: String, end: String) {
    world
        .post_form(
            "/cycles",
            &[
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("flow_intensity", "light"),
                ("notes", ""),
            ],
        )
        .await;
}

#[when(regex = r#"^I submit a "([^"]+)" symptom "([^"]+)" on "([^"]*)" with severity "([^"]*)"$"#)]
async fn when_submit_symptom(
    world: &mut AppWorld,
    category: String,
    symptom_type: String,
    date: String,
    severity: String,
) {
    world
        .post_form(
            "/symptoms",
            &[
                ("date", date.as_str()),
                ("category", category.as_str()),
                ("symptom_type", symptom_type.as_str()),
                ("severity", severity.as_str()),
                ("notes", ""),
            ],
        )
        .await;
}

#[when(regex = r#"^I change the severity of symptom "([^"]+)" to "([^"]+)"$"#)]
async fn when_edit_symptom(world: &mut AppWorld, symptom_type: String, severity: String) {
    let id = world
        .fake()
        .record_id("symptoms", "symptom_type", &symptom_type)
        .expect("symptom exists");
    let date = world.fake().with(|data| {
        data.symptoms
            .iter()
            .find(|s| s["id"].as_i64() == Some(id))
            .and_then(|s| s["date"].as_str())
            .map(str::to_string)
            .expect("symptom has a date")
    });
    world
        .post_form(
            &format!("/symptoms/{id}"),
            &[
                ("date", date.as_str()),
                ("category", "Physical"),
                ("symptom_type", symptom_type.as_str()),
                ("severity", severity.as_str()),
                ("notes", ""),
            ],
        )
        .await;
}

#[when(regex = r#"^I submit a reminder "([^"]+)" at "([^"]*)"$"#)]
async fn when_submit_reminder(world: &mut AppWorld, name: String, time: String) {
    world.upcoming_before = Some(world.fake().with(|data| data.upcoming_fetches));
    world
        .post_form(
            "/reminders",
            &[
                ("name", name.as_str()),
                ("dosage", "1 tablet"),
                ("time", time.as_str()),
                ("frequency", "daily"),
                ("category", "General"),
                ("tags", ""),
            ],
        )
        .await;
}

#[when(regex = r#"^I rename reminder "([^"]+)" to "([^"]+)"$"#)]
async fn when_rename_reminder(world: &mut AppWorld, name: String, renamed: String) {
    let id = world
        .fake()
        .record_id("reminders", "name", &name)
        .expect("reminder exists");
    world.upcoming_before = Some(world.fake().with(|data| data.upcoming_fetches));
    world
        .post_form(
            &format!("/reminders/{id}"),
            &[
                ("name", renamed.as_str()),
                ("dosage", "1 tablet"),
                ("time", "08:00"),
                ("frequency", "daily"),
                ("category", "General"),
                ("tags", ""),
            ],
        )
        .await;
}

#[when(regex = r#"^I ask to delete the (cycle|symptom|reminder) whose (\w+) is "([^"]+)"$"#)]
async fn when_ask_delete(world: &mut AppWorld, kind: String, field: String, value: String) {
    let collection = format!("{kind}s");
    let id = world
        .fake()
        .record_id(&collection, &field, &value)
        .expect("record exists");
    let action = format!("/{collection}/{id}/delete");
    world.get(&action).await;
    world.pending_delete = Some(action);
}

#[when("I confirm the deletion")]
async fn when_confirm_delete(world: &mut AppWorld) {
    let action = world.pending_delete.take().expect("ask to delete first");
    world.post_form(&action, &[]).await;
}

#[when("the poller fetches notifications")]
async fn when_poller_fetches(world: &mut AppWorld) {
    let outcome = world
        .app_state()
        .poller
        .fetch_due()
        .await
        .expect("fetch notifications");
    world.outcome = Some(outcome);
}

#[when(regex = r#"^I mark notification "([^"]+)" read twice$"#)]
async fn when_mark_read_twice(world: &mut AppWorld, title: String) {
    let id = world.fake().notification_id(&title).expect("notification exists");
    for _ in 0..2 {
        world
            .post_form(&format!("/notifications/{id}/read"), &[])
            .await;
        assert_eq!(world.page().status, StatusCode::SEE_OTHER);
    }
}

#[when(regex = r#"^I snooze notification "([^"]+)"$"#)]
async fn when_snooze(world: &mut AppWorld, title: String) {
    let id = world.fake().notification_id(&title).expect("notification exists");
    world
        .post_form(&format!("/notifications/{id}/snooze"), &[("minutes", "60")])
        .await;
}

// Checks

#[then(regex = r#"^I am redirected to "([^"]+)"$"#)]
async fn then_redirected(world: &mut AppWorld, target: String) {
    let page = world.page();
    assert!(page.status.is_redirection(), "status was {}", page.status);
    assert_eq!(page.location.as_deref(), Some(target.as_str()));
}

#[then(regex = r"^the response status is (\d+)$")]
async fn then_status(world: &mut AppWorld, status: u16) {
    assert_eq!(world.page().status.as_u16(), status, "{}", world.page().body);
}

#[then(regex = r#"^the page contains "([^"]+)"$"#)]
async fn then_page_contains(world: &mut AppWorld, text: String) {
    let body = &world.page().body;
    assert!(body.contains(&text), "page did not contain {text:?}:\n{body}");
}

#[then(regex = r"^the stored session expires (\d+) days after login$")]
async fn then_session_expiry(world: &mut AppWorld, days: i64) {
    let (before, after) = world.login_window.expect("log in first");
    let session = world.stored_session().await.expect("a stored session");
    let ttl = ChronoDuration::days(days);
    // Stored with millisecond precision.
    let slack = ChronoDuration::milliseconds(1);
    assert!(session.expiry >= before + ttl - slack, "expiry {} too early", session.expiry);
    assert!(session.expiry <= after + ttl, "expiry {} too late", session.expiry);
}

#[then(regex = r#"^the logged in user is "([^"]+)"$"#)]
async fn then_logged_in_as(world: &mut AppWorld, username: String) {
    let user = world.app_state().session.current_user().expect("a user");
    assert_eq!(user.username, username);
}

#[then("no user is logged in")]
async fn then_no_user(world: &mut AppWorld) {
    assert!(!world.app_state().session.is_logged_in());
}

#[then("no session is stored")]
async fn then_no_session(world: &mut AppWorld) {
    assert!(world.stored_session().await.is_none());
}

#[then("the notification poller is idle")]
async fn then_poller_idle(world: &mut AppWorld) {
    assert_eq!(world.app_state().poller.state(), PollerState::Idle);
    assert_eq!(world.app_state().poller.unread_count().await, 0);
}

#[then(regex = r"^the unread count is (\d+)$")]
async fn then_unread(world: &mut AppWorld, expected: usize) {
    assert_eq!(world.app_state().poller.unread_count().await, expected);
}

#[then(regex = r#"^a due alert for "([^"]+)" is raised$"#)]
async fn then_due_alert(world: &mut AppWorld, title: String) {
    let outcome = world.outcome.as_ref().expect("fetch first");
    let alert = outcome.due_alert.as_ref().expect("a due alert");
    assert_eq!(alert.headline(), title);
}

#[then("no due alert is raised")]
async fn then_no_due_alert(world: &mut AppWorld) {
    let outcome = world.outcome.as_ref().expect("fetch first");
    assert!(outcome.due_alert.is_none());
}

#[then(regex = r"^the service received (\d+) read requests?$")]
async fn then_read_requests(world: &mut AppWorld, expected: usize) {
    let seen = world.fake().with(|data| data.read_requests.len());
    assert_eq!(seen, expected);
}

#[then(regex = r"^the service stores (\d+) (cycle|symptom|reminder)s?$")]
async fn then_record_count(world: &mut AppWorld, expected: usize, kind: String) {
    let stored = world.fake().with(|data| match kind.as_str() {
        "cycle" => data.cycles.len(),
        "symptom" => data.symptoms.len(),
        _ => data.reminders.len(),
    });
    assert_eq!(stored, expected);
}

#[then(regex = r#"^the service stores a symptom "([^"]+)" with severity (\d)$"#)]
async fn then_symptom_stored(world: &mut AppWorld, symptom_type: String, severity: u64) {
    let found = world.fake().with(|data| {
        data.symptoms
            .iter()
            .any(|s| s["symptom_type"] == symptom_type.as_str() && s["severity"] == severity)
    });
    assert!(found, "no {symptom_type} symptom with severity {severity}");
}

#[then(regex = r#"^the service stores a reminder "([^"]+)"$"#)]
async fn then_reminder_stored(world: &mut AppWorld, name: String) {
    let id = world.fake().record_id("reminders", "name", &name);
    assert!(id.is_some(), "no reminder named {name}");
}

#[then("the upcoming notifications were fetched again")]
async fn then_refetched(world: &mut AppWorld) {
    let before = world.upcoming_before.expect("submit a reminder first");
    let now = world.fake().with(|data| data.upcoming_fetches);
    assert!(now > before, "no refetch: {before} -> {now}");
}

#[then("the notification poller goes idle")]
async fn then_poller_goes_idle(world: &mut AppWorld) {
    wait_for_poller(world, PollerState::Idle).await;
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run_and_exit("tests/features")
        .await;
}
