use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    catalog::{BuildingKind, EffectBundle},
    clock::Clock,
    engine::{Applied, Engine},
    indicators::HistoricDataPoint,
    scenario::Scenario,
    spatial::GridCell,
    world::{Event, SimError, WorldSnapshot},
};

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub month_duration: Duration,
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        month_duration,
        host,
        port,
    } = config;

    let engine = Arc::new(
        scenario
            .build_engine()
            .with_context(|| format!("Failed to build engine for '{}'", scenario.name))?,
    );
    let clock = Clock::spawn(engine.clone(), month_duration);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, scenario = %scenario.name, "settlement API listening (Ctrl+C to stop)");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    clock.shutdown().await;
    Ok(())
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/state", get(current_state))
        .route("/api/history", get(history))
        .route("/api/catalog", get(catalog))
        .route("/api/events", get(stream_months))
        .route("/api/buildings", post(place_building))
        .route("/api/challenge/dismiss", post(dismiss_challenge))
        .route("/api/pause", post(pause))
        .route("/api/resume", post(resume))
        .with_state(AppState { engine })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

#[derive(Debug, Serialize)]
struct StateEnvelope {
    scenario: String,
    paused: bool,
    blocked: bool,
    snapshot: WorldSnapshot,
}

fn envelope(engine: &Engine) -> StateEnvelope {
    StateEnvelope {
        scenario: engine.settings().scenario_name.clone(),
        paused: engine.is_paused(),
        blocked: engine.is_blocked(),
        snapshot: engine.snapshot(),
    }
}

async fn current_state(State(state): State<AppState>) -> Json<StateEnvelope> {
    Json(envelope(&state.engine))
}

async fn history(State(state): State<AppState>) -> Json<Vec<HistoricDataPoint>> {
    Json(state.engine.state().history().to_vec())
}

#[derive(Debug, Serialize)]
struct CatalogItem {
    kind: BuildingKind,
    name: String,
    description: String,
    effects: EffectBundle,
}

async fn catalog(State(state): State<AppState>) -> Json<Vec<CatalogItem>> {
    let items = state
        .engine
        .rules()
        .catalog
        .iter()
        .map(|(kind, entry)| CatalogItem {
            kind,
            name: entry.name.clone(),
            description: entry.description.clone(),
            effects: entry.effects,
        })
        .collect();
    Json(items)
}

async fn stream_months(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.engine.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(report) => serde_json::to_string(&report)
            .ok()
            .map(|payload| Ok(SseEvent::default().event("month").data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[derive(Debug, Deserialize)]
struct PlaceRequest {
    kind: BuildingKind,
    x: i32,
    z: i32,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    events: Vec<Event>,
    snapshot: WorldSnapshot,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    reason: &'static str,
    message: String,
}

fn error_response(err: SimError) -> Response {
    let (status, reason) = match &err {
        SimError::Rejected(rejection) => (StatusCode::CONFLICT, rejection.code()),
        SimError::ChallengeUnavailable(_) => (StatusCode::CONFLICT, "challenge_unavailable"),
        SimError::UnknownBuildingKind(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "unknown_building_kind")
        }
    };
    if err.is_fatal() {
        warn!(error = %err, "fatal error while handling request");
    }
    let body = ErrorBody {
        reason,
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}

fn command_response(engine: &Engine, result: Result<Applied, SimError>) -> Response {
    match result {
        Ok(applied) => Json(CommandResponse {
            events: applied.events,
            snapshot: applied.state.snapshot(engine.rules()),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn place_building(
    State(state): State<AppState>,
    Json(request): Json<PlaceRequest>,
) -> Response {
    let result = state
        .engine
        .place(request.kind, GridCell::new(request.x, request.z));
    command_response(&state.engine, result)
}

async fn dismiss_challenge(State(state): State<AppState>) -> Response {
    let result = state.engine.dismiss_challenge();
    command_response(&state.engine, result)
}

async fn pause(State(state): State<AppState>) -> Json<StateEnvelope> {
    state.engine.pause();
    Json(envelope(&state.engine))
}

async fn resume(State(state): State<AppState>) -> Json<StateEnvelope> {
    state.engine.resume();
    Json(envelope(&state.engine))
}
