use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keygrid::{expand, repair, Grid, SparseLevel, TileCatalog, TileDef};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::prompt::build_prompt;
use crate::AppState;

pub const DEFAULT_NAME: &str = "Untitled Escape Room";
pub const DEFAULT_LIVES: u32 = 3;
pub const DEFAULT_INVENTORY_CAPACITY: u32 = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMapRequest {
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub theme_id: Option<String>,
    #[serde(default)]
    pub tile_catalog: Vec<TileDef>,
    #[serde(default)]
    pub start_tile: String,
    #[serde(default)]
    pub exit_tile: String,
    #[serde(default)]
    pub mission_types: Vec<String>,
    #[serde(default)]
    pub ai_rules: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMapResponse {
    pub name: String,
    pub grid: Grid,
    pub missions: Vec<serde_json::Value>,
    pub lives: u32,
    pub inventory_capacity: u32,
    pub repairs: Vec<String>,
}

/// `POST /api/generate-map`. One generator call per request, no retry; the
/// only hard failure after that call is an unparseable response (422).
/// Everything parseable is expanded and repaired into a legal grid.
pub async fn generate_map(
    State(state): State<AppState>,
    Json(req): Json<GenerateMapRequest>,
) -> Response {
    if req.story.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "story is required");
    }
    if req.tile_catalog.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "tileCatalog is required");
    }
    if req.start_tile.is_empty() || req.exit_tile.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "startTile and exitTile are required");
    }

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(k) if !k.is_empty() => k,
        _ => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "generator not configured: OPENAI_API_KEY is unset",
            )
        }
    };

    let prompt = build_prompt(&req);
    let raw = match call_generator(&state, &api_key, &prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(err = %e, "generator call failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("generator call failed: {e}"),
            );
        }
    };

    let stripped = strip_code_fences(&raw);
    let sparse: SparseLevel = match serde_json::from_str(stripped) {
        Ok(level) => level,
        Err(e) => {
            warn!(err = %e, "generator response not parseable");
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!(
                    "generator response was not a valid level description ({e}); please retry. raw: {}",
                    excerpt(stripped, 400)
                ),
            );
        }
    };

    let resp = assemble_response(&req, sparse);
    info!(name = %resp.name, repairs = resp.repairs.len(), "level generated");
    (StatusCode::OK, Json(resp)).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({"error": msg}))).into_response()
}

/// Expansion + repair + defaults. Synchronous and total: any parseable
/// description becomes a legal level.
fn assemble_response(req: &GenerateMapRequest, sparse: SparseLevel) -> GenerateMapResponse {
    let catalog = TileCatalog::new(&req.tile_catalog);
    let mut grid = expand(&sparse);
    let repairs = repair(&mut grid, &catalog, &req.start_tile, &req.exit_tile);

    let name = sparse
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_string());
    let missions = sparse
        .missions
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| vec![json!({"type": "reach-exit", "description": "Reach the exit"})]);

    GenerateMapResponse {
        name,
        grid,
        missions,
        lives: sparse.lives.unwrap_or(DEFAULT_LIVES),
        inventory_capacity: sparse.inventory_capacity.unwrap_or(DEFAULT_INVENTORY_CAPACITY),
        repairs,
    }
}

async fn call_generator(state: &AppState, api_key: &str, prompt: &str) -> anyhow::Result<String> {
    let url = format!("{}/chat/completions", state.api_base.trim_end_matches('/'));
    let body = json!({
        "model": state.model,
        "messages": [
            {"role": "user", "content": prompt}
        ],
        "temperature": 0.7,
    });

    let resp = state
        .http
        .post(url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("chat http={}", status.as_u16());
    }

    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("choices")?
                .as_array()?
                .first()?
                .get("message")?
                .get("content")?
                .as_str()
                .map(|s| s.to_string())
        })
        .ok_or_else(|| anyhow::anyhow!("chat response missing message content"))
}

/// The generator may wrap its answer in a fenced code block, with or without
/// a language label, with or without prose around it. Slice out the fenced
/// body when fences are present; otherwise the trimmed text as-is.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[open + 3..];
    let body = match rest.split_once('\n') {
        Some((label, body))
            if label.trim().chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            body
        }
        _ => rest,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn excerpt(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
