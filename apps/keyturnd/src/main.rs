use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

mod generate;
mod prompt;
mod rooms;
mod ws;

fn usage_and_exit() -> ! {
    eprintln!(
        "keyturnd

USAGE:
  keyturnd [--bind HOST:PORT] [--api-base URL] [--model NAME]

ENV:
  KEYTURN_BIND           default 0.0.0.0:8090
  OPENAI_API_KEY         required for /api/generate-map (relay works without it)
  OPENAI_API_BASE        default https://api.openai.com/v1
  KEYTURN_MODEL          default gpt-4o-mini
  KEYTURN_GEN_TIMEOUT_S  default 60 (deadline around the generator call)
"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    bind: SocketAddr,
    api_base: String,
    model: String,
    gen_timeout_s: u64,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("KEYTURN_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8090".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let mut api_base = std::env::var("OPENAI_API_BASE")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let mut model = std::env::var("KEYTURN_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

    let gen_timeout_s = std::env::var("KEYTURN_GEN_TIMEOUT_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--api-base" => {
                api_base = it.next().unwrap_or_else(|| usage_and_exit());
            }
            "--model" => {
                model = it.next().unwrap_or_else(|| usage_and_exit());
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        bind,
        api_base,
        model,
        gen_timeout_s,
    }
}

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<rooms::RoomRegistry>,
    pub http: reqwest::Client,
    pub api_base: String,
    pub model: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Browser clients live on other origins. Preflights are answered with 204;
/// every other response carries the allow-origin header.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            ],
        )
            .into_response();
    }
    let mut resp = next.run(req).await;
    resp.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    resp
}

async fn fallback() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.gen_timeout_s.max(1)))
        .build()
        .context("build http client")?;

    let state = AppState {
        rooms: Arc::new(rooms::RoomRegistry::new()),
        http,
        api_base: cfg.api_base.clone(),
        model: cfg.model.clone(),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/generate-map", post(generate::generate_map))
        .route("/ws", get(ws::ws_upgrade))
        .fallback(fallback)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(bind = %cfg.bind, api_base = %cfg.api_base, model = %cfg.model, "keyturnd listening");
    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
