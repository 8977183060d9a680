use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use flashzap_core::{
    add_card, delete_card as remove_card, edit_card, import_cards as import_all, list_page, CardChanges,
    GradingOracle, PageRequest, Repository, ReviewPolicy, ReviewQueue, DEFAULT_PER_PAGE,
};

use crate::api::dto::{
    AnswerIn, AnswerOut, CardIn, CardOut, CardPageOut, ImportOut, PageQuery, PromptOut, SessionOut,
};
use crate::api::error::ApiError;
use crate::api::sessions::SessionRegistry;

pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub oracle: Arc<dyn GradingOracle>,
    pub policy: ReviewPolicy,
    pub sessions: SessionRegistry,
}

type ApiResult<T> = Result<T, ApiError>;

// ===== Cards =====

pub async fn list_cards(State(st): State<Arc<AppState>>, Query(q): Query<PageQuery>) -> ApiResult<Json<CardPageOut>> {
    let req = PageRequest {
        page: q.page.unwrap_or(1),
        per_page: q.per_page.unwrap_or(DEFAULT_PER_PAGE),
    };
    let page = list_page(&*st.repo, req).await?;
    Ok(Json(page.into()))
}

pub async fn create_card(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CardIn>,
) -> ApiResult<(StatusCode, Json<CardOut>)> {
    let card = add_card(&*st.repo, &body.front, &body.back).await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

pub async fn get_card(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<CardOut>> {
    Ok(Json(st.repo.get_card(id).await?.into()))
}

pub async fn patch_card(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CardChanges>,
) -> ApiResult<Json<CardOut>> {
    if body.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "nothing to update"));
    }
    let today = Utc::now().date_naive();
    let card = edit_card(&*st.repo, id, body, &st.policy.model, today).await?;
    Ok(Json(card.into()))
}

pub async fn delete_card(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    remove_card(&*st.repo, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body is the raw JSON document: `[{"front": "...", "back": "..."}, ...]`.
pub async fn import_cards(State(st): State<Arc<AppState>>, body: String) -> ApiResult<(StatusCode, Json<ImportOut>)> {
    let added = import_all(&*st.repo, &body).await?;
    Ok((StatusCode::CREATED, Json(ImportOut { imported: added.len() })))
}

// ===== Review sessions =====

#[derive(Deserialize)]
pub struct StartQuery {
    shuffle: Option<bool>,
}

pub async fn start_session(
    State(st): State<Arc<AppState>>,
    Query(q): Query<StartQuery>,
) -> ApiResult<(StatusCode, Json<SessionOut>)> {
    let mut policy = st.policy.clone();
    if let Some(shuffle) = q.shuffle {
        policy.shuffle = shuffle;
    }
    let today = Utc::now().date_naive();
    let queue = ReviewQueue::start(st.repo.clone(), st.oracle.clone(), policy, today).await?;

    if queue.is_drained() {
        return Ok((
            StatusCode::OK,
            Json(SessionOut {
                session_id: None,
                remaining: 0,
                card: None,
            }),
        ));
    }

    let remaining = queue.remaining();
    let card = queue.peek_next().map(PromptOut::from);
    let (id, _) = st.sessions.insert(queue);
    info!(session_id = %id, remaining, open_sessions = st.sessions.len(), "review session started");
    Ok((
        StatusCode::CREATED,
        Json(SessionOut {
            session_id: Some(id),
            remaining,
            card,
        }),
    ))
}

pub async fn get_session(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<SessionOut>> {
    let shared = st.sessions.get(id).ok_or_else(ApiError::session_not_found)?;
    let queue = shared.lock().await;
    Ok(Json(SessionOut {
        session_id: Some(id),
        remaining: queue.remaining(),
        card: queue.peek_next().map(PromptOut::from),
    }))
}

pub async fn end_session(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !st.sessions.remove(id) {
        return Err(ApiError::session_not_found());
    }
    info!(session_id = %id, "review session ended");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_answer(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerIn>,
) -> ApiResult<Json<AnswerOut>> {
    let shared = st.sessions.get(id).ok_or_else(ApiError::session_not_found)?;
    let mut queue = shared.lock().await;

    let correct_answer = match queue.peek_next() {
        Some(c) if c.id == body.card_id => c.back.clone(),
        _ => String::new(),
    };
    let out = queue.submit_answer(body.card_id, &body.answer).await?;

    let remaining = queue.remaining();
    let next = queue.peek_next().map(PromptOut::from);
    if queue.is_drained() {
        st.sessions.remove(id);
        info!(session_id = %id, "review session finished");
    }
    Ok(Json(AnswerOut::new(out, correct_answer, remaining, next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use axum::Router;
    use flashzap_core::{Grade, MemoryRepo, OracleError, Verdict};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Correct iff the answer matches the back exactly; "FAIL" simulates an outage.
    struct ScriptedOracle;

    #[async_trait]
    impl GradingOracle for ScriptedOracle {
        async fn grade(&self, _q: &str, reference: &str, answer: &str) -> Result<Verdict, OracleError> {
            if answer == "FAIL" {
                return Err(OracleError::Unavailable("scripted outage".into()));
            }
            let grade = if answer.trim() == reference { Grade::Correct } else { Grade::Incorrect };
            Ok(Verdict {
                grade,
                feedback: format!("expected {reference}"),
            })
        }
    }

    fn app() -> Router {
        let state = AppState {
            repo: Arc::new(MemoryRepo::new()),
            oracle: Arc::new(ScriptedOracle),
            policy: ReviewPolicy::default(),
            sessions: SessionRegistry::new(Duration::from_secs(600)),
        };
        router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn create(app: &Router, front: &str, back: &str) -> String {
        let (status, v) = call(app, Method::POST, "/cards", Some(json!({ "front": front, "back": back }))).await;
        assert_eq!(status, StatusCode::CREATED);
        v["id"].as_str().unwrap().to_string()
    }

    async fn back_of(app: &Router, id: &str) -> String {
        let (_, v) = call(app, Method::GET, &format!("/cards/{id}"), None).await;
        v["back"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn card_lifecycle() {
        let app = app();
        let id = create(&app, "2+2", "4").await;

        let (status, v) = call(&app, Method::GET, &format!("/cards/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["mastery_level"], 0);
        assert!(v["next_review_date"].is_null());

        let (status, v) = call(&app, Method::PATCH, &format!("/cards/{id}"), Some(json!({ "front": "two plus two" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["front"], "two plus two");
        assert_eq!(v["back"], "4");

        let (status, _) = call(&app, Method::PATCH, &format!("/cards/{id}"), Some(json!({ "mastery_level": 3 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // A refused level raise must not save the front sent alongside it.
        let patch = json!({ "front": "changed", "mastery_level": 3 });
        let (status, _) = call(&app, Method::PATCH, &format!("/cards/{id}"), Some(patch)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (_, v) = call(&app, Method::GET, &format!("/cards/{id}"), None).await;
        assert_eq!(v["front"], "two plus two");

        let (status, _) = call(&app, Method::PATCH, &format!("/cards/{id}"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::DELETE, &format!("/cards/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &format!("/cards/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_invalid_cards() {
        let app = app();
        let (status, v) = call(&app, Method::POST, "/cards", Some(json!({ "front": "", "back": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["error"].is_string());

        let long = "a".repeat(201);
        let (status, _) = call(&app, Method::POST, "/cards", Some(json!({ "front": "q", "back": long }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_pages() {
        let app = app();
        for i in 0..5 {
            create(&app, &format!("q{i}"), "a").await;
        }
        let (status, v) = call(&app, Method::GET, "/cards?page=2&per_page=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["total"], 5);
        assert_eq!(v["total_pages"], 3);
        assert_eq!(v["cards"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_is_all_or_nothing() {
        let app = app();
        let bad = json!([{ "front": "ok", "back": "ok" }, { "front": "missing back" }]);
        let (status, _) = call(&app, Method::POST, "/cards/import", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, v) = call(&app, Method::GET, "/cards", None).await;
        assert_eq!(v["total"], 0);

        let good = json!([{ "front": "a", "back": "1" }, { "front": "b", "back": "2" }]);
        let (status, v) = call(&app, Method::POST, "/cards/import", Some(good)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["imported"], 2);
    }

    #[tokio::test]
    async fn empty_store_opens_no_session() {
        let app = app();
        let (status, v) = call(&app, Method::POST, "/review/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["session_id"].is_null());
        assert_eq!(v["remaining"], 0);
    }

    #[tokio::test]
    async fn review_session_flow() {
        let app = app();
        create(&app, "capital of France", "Paris").await;
        create(&app, "capital of Japan", "Tokyo").await;

        let (status, v) = call(&app, Method::POST, "/review/sessions?shuffle=false", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["remaining"], 2);
        assert!(v["card"]["back"].is_null());
        let sid = v["session_id"].as_str().unwrap().to_string();
        let answer_uri = format!("/review/sessions/{sid}/answer");

        // Outage: nothing moves.
        let first = v["card"]["card_id"].as_str().unwrap().to_string();
        let (status, _) = call(&app, Method::POST, &answer_uri, Some(json!({ "card_id": first, "answer": "FAIL" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (_, v) = call(&app, Method::GET, &format!("/review/sessions/{sid}"), None).await;
        assert_eq!(v["card"]["card_id"], first.as_str());
        assert_eq!(v["remaining"], 2);

        // Wrong at level 0: card goes to the back.
        let (status, v) = call(&app, Method::POST, &answer_uri, Some(json!({ "card_id": first, "answer": "no idea" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["grade"], "Incorrect");
        assert_eq!(v["requeued"], true);
        assert_eq!(v["old_level"], 0);
        assert_eq!(v["new_level"], 0);
        assert_eq!(v["remaining"], 2);
        let second = v["next"]["card_id"].as_str().unwrap().to_string();
        assert_ne!(second, first);

        // Answering out of turn is refused.
        let (status, _) = call(&app, Method::POST, &answer_uri, Some(json!({ "card_id": first, "answer": "x" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let back = back_of(&app, &second).await;
        let (_, v) = call(&app, Method::POST, &answer_uri, Some(json!({ "card_id": second, "answer": back }))).await;
        assert_eq!(v["grade"], "Correct");
        assert_eq!(v["new_level"], 1);
        assert_eq!(v["correct_answer"], back.as_str());
        assert_eq!(v["remaining"], 1);
        assert_eq!(v["next"]["card_id"], first.as_str());

        let back = back_of(&app, &first).await;
        let (_, v) = call(&app, Method::POST, &answer_uri, Some(json!({ "card_id": first, "answer": back }))).await;
        assert_eq!(v["remaining"], 0);
        assert!(v["next"].is_null());

        // Drained sessions are dropped.
        let (status, _) = call(&app, Method::GET, &format!("/review/sessions/{sid}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Both cards are now scheduled for tomorrow, so nothing is due.
        let (_, v) = call(&app, Method::POST, "/review/sessions", None).await;
        assert!(v["session_id"].is_null());
    }

    #[tokio::test]
    async fn ended_sessions_are_gone() {
        let app = app();
        create(&app, "q", "a").await;
        let (_, v) = call(&app, Method::POST, "/review/sessions", None).await;
        let sid = v["session_id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::DELETE, &format!("/review/sessions/{sid}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &format!("/review/sessions/{sid}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
