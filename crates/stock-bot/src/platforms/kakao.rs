//! KakaoTalk skill server
//!
//! Kakao posts a skill payload to `/stock` and expects a version 2.0 skill
//! response with a single `simpleText` output. Every request, including
//! malformed ones, is answered with HTTP 200 and a text the user can read.

use crate::handler::{RequestHandler, TRANSIENT_ERROR_REPLY};
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

const SKILL_VERSION: &str = "2.0";

/// Incoming skill payload, reduced to the fields we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRequest {
    #[serde(default)]
    pub user_request: Option<UserRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRequest {
    #[serde(default)]
    pub utterance: Option<String>,
}

impl SkillRequest {
    /// The user's utterance, if present and non-blank
    pub fn utterance(&self) -> Option<&str> {
        self.user_request
            .as_ref()
            .and_then(|r| r.utterance.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

/// Skill response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResponse {
    pub version: String,
    pub template: SkillTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTemplate {
    pub outputs: Vec<SkillOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillOutput {
    pub simple_text: SimpleText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleText {
    pub text: String,
}

impl SkillResponse {
    /// Envelope with exactly one `simpleText` output
    pub fn simple_text(text: impl Into<String>) -> Self {
        Self {
            version: SKILL_VERSION.to_string(),
            template: SkillTemplate {
                outputs: vec![SkillOutput {
                    simple_text: SimpleText { text: text.into() },
                }],
            },
        }
    }
}

/// Routes for the skill server
pub fn router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/stock", post(stock_skill))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn stock_skill(State(handler): State<Arc<RequestHandler>>, body: Bytes) -> Json<SkillResponse> {
    let span = info_span!("kakao_skill", request_id = %Uuid::new_v4());

    async move {
        let request: SkillRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed skill payload: {e}");
                return Json(SkillResponse::simple_text(TRANSIENT_ERROR_REPLY));
            }
        };

        let Some(utterance) = request.utterance() else {
            warn!("Skill payload without utterance");
            return Json(SkillResponse::simple_text(TRANSIENT_ERROR_REPLY));
        };

        Json(SkillResponse::simple_text(handler.handle(utterance).await))
    }
    .instrument(span)
    .await
}

async fn health() -> &'static str {
    "OK"
}
