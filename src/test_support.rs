use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::attempt::registry::AttemptRegistry;
use crate::core::{config::Settings, security, state::AppState};
use crate::db::models::{Question, TestDefinition};
use crate::store::memory::MemoryStore;
use crate::store::{AttemptStore, TestStore};

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("PREPLINE_ENV", "test");
    std::env::set_var("SECRET_KEY", "test-secret");
    std::env::set_var("DEFAULT_TEST_DURATION_MINUTES", "30");
    std::env::set_var("AUTO_SAVE_INTERVAL_SECONDS", "15");
    std::env::set_var("SESSION_SWEEP_INTERVAL_SECONDS", "300");
}

pub(crate) fn test_settings() -> Settings {
    set_test_env();
    Settings::load().expect("settings")
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::new());
    let tests: Arc<dyn TestStore> = store.clone();
    let attempts: Arc<dyn AttemptStore> = store.clone();

    let state = AppState::new(settings, tests, attempts, AttemptRegistry::new());
    let app = api::router::router(state.clone());

    TestContext { state, app, store, _guard: guard }
}

pub(crate) fn test_definition(id: &str, duration_minutes: Option<i32>) -> TestDefinition {
    TestDefinition { id: id.to_string(), title: format!("Mock test {id}"), duration_minutes }
}

pub(crate) fn question(id: &str, test_id: &str, options: &[&str]) -> Question {
    Question {
        id: id.to_string(),
        test_id: test_id.to_string(),
        prompt: format!("Prompt for {id}"),
        options: Json(options.iter().map(|option| option.to_string()).collect()),
    }
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
