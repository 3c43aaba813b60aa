//! Route handlers and the route table.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;

use crate::core::{Handler, Request, Response, Router};
use crate::error::WebError;
use crate::password::{self, GenerateOptions};
use crate::stats::{CounterRecord, CounterStore, History};
use crate::utils::SpaDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub total: u64,
    pub today: u64,
}

impl From<&CounterRecord> for StatsSummary {
    fn from(record: &CounterRecord) -> Self {
        Self {
            total: record.total,
            today: record.today,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub password: String,
    pub stats: StatsSummary,
    /// Present when the counters could not be updated; `stats` is then stale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total: u64,
    pub today: u64,
    pub history: History,
    pub ts: Option<String>,
}

impl From<CounterRecord> for StatsResponse {
    fn from(record: CounterRecord) -> Self {
        Self {
            total: record.total,
            today: record.today,
            history: record.history,
            ts: record.ts,
        }
    }
}

/// `POST /generate`
pub struct GenerateHandler {
    store: Arc<CounterStore>,
}

impl GenerateHandler {
    pub fn new(store: Arc<CounterStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl Handler for GenerateHandler {
    async fn handle(&self, req: Request) -> Result<Response, WebError> {
        let options: GenerateOptions = req.json()?;
        // validation failures return before the store is touched
        let password = password::generate(&options)?;

        let outcome = self.store.record_generation().await;
        let body = GenerateResponse {
            password,
            stats: StatsSummary::from(outcome.record()),
            warning: outcome.warning(),
        };
        Ok(Response::json(StatusCode::OK, &body))
    }
}

/// `GET /api/stats`
pub struct StatsHandler {
    store: Arc<CounterStore>,
}

impl StatsHandler {
    pub fn new(store: Arc<CounterStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl Handler for StatsHandler {
    async fn handle(&self, _req: Request) -> Result<Response, WebError> {
        let record = self.store.read().await?;
        Ok(Response::json(StatusCode::OK, StatsResponse::from(record)))
    }
}

/// The full route table: API routes plus the frontend for everything else.
pub fn routes(store: Arc<CounterStore>, frontend: SpaDir) -> Router {
    let frontend = Arc::new(frontend);
    let mut router = Router::new();
    router.post("/generate", GenerateHandler::new(Arc::clone(&store)));
    router.get("/api/stats", StatsHandler::new(store));
    router.get("/", frontend.clone());
    router.get("/{*path}", frontend);
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Method;
    use crate::stats::FixedClock;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn store_in(dir: &tempfile::TempDir) -> Arc<CounterStore> {
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()));
        Arc::new(CounterStore::open(dir.path().join("data.json"), clock).unwrap())
    }

    async fn call(handler: Arc<dyn Handler>, req: Request) -> (StatusCode, Value) {
        let res = match handler.handle(req).await {
            Ok(res) => res,
            Err(e) => e.into_response(),
        };
        let body = serde_json::from_slice(res.body_bytes().unwrap()).unwrap();
        (res.status, body)
    }

    fn post(body: &str) -> Request {
        Request::new(Method::POST, "/generate").with_body(body.to_string())
    }

    #[tokio::test]
    async fn generate_returns_password_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let handler = GenerateHandler::new(Arc::clone(&store));

        let (status, body) = call(handler.clone(), post(r#"{"length": 20}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["password"].as_str().unwrap().len(), 20);
        assert_eq!(body["stats"], json!({"total": 1, "today": 1}));
        assert!(body.get("warning").is_none());

        let (_, body) = call(handler, post("")).await;
        assert_eq!(body["password"].as_str().unwrap().len(), 16);
        assert_eq!(body["stats"], json!({"total": 2, "today": 2}));
    }

    #[tokio::test]
    async fn empty_pool_is_400_and_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let before = store.read().await.unwrap();

        let req = post(r#"{"upper": false, "lower": false, "numbers": false, "symbols": false}"#);
        let (status, body) = call(GenerateHandler::new(Arc::clone(&store)), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Select at least one character set"}));
        assert_eq!(store.read().await.unwrap(), before);
    }

    #[tokio::test]
    async fn numeric_flags_are_truthy() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let req = post(r#"{"upper": 1, "lower": 0, "numbers": 0, "symbols": 0, "length": 32.0}"#);
        let (status, body) = call(GenerateHandler::new(Arc::clone(&store)), req).await;
        assert_eq!(status, StatusCode::OK);
        let password = body["password"].as_str().unwrap();
        assert_eq!(password.len(), 32);
        assert!(password.chars().all(|c| c.is_ascii_uppercase()));

        let req = post(r#"{"upper": 0, "lower": null, "numbers": "", "symbols": false}"#);
        let (status, body) = call(GenerateHandler::new(Arc::clone(&store)), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Select at least one character set"}));
        assert_eq!(store.read().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(GenerateHandler::new(store_in(&dir)), post("{\"length\":")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn failed_count_still_returns_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.bump().await.unwrap();
        std::fs::write(store.path(), "garbage").unwrap();

        let (status, body) = call(GenerateHandler::new(store), post("{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["password"].as_str().unwrap().len(), 16);
        assert_eq!(body["stats"], json!({"total": 1, "today": 1}));
        assert!(body["warning"].as_str().unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn stats_reports_full_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.bump().await.unwrap();

        let req = Request::new(Method::GET, "/api/stats");
        let (status, body) = call(StatsHandler::new(store), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["today"], 1);
        assert_eq!(
            body["history"],
            json!({"Mon": 0, "Tue": 0, "Wed": 1, "Thu": 0, "Fri": 0, "Sat": 0, "Sun": 0})
        );
        assert_eq!(body["ts"], "2024-01-03T12:00:00.000000Z");
        assert!(body.get("today_date").is_none());
    }

    #[tokio::test]
    async fn stats_on_corrupt_store_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "[").unwrap();

        let (status, body) = call(StatsHandler::new(store), Request::new(Method::GET, "/api/stats")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("malformed"));
    }
}
