// Daily Sales Collection - Web Server
// JSON API over the submission pipeline: reference lists out, entries in.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use sales_collection::{
    ControllerConfig, EntrySession, ReferenceData, SqliteGateway, SubmissionController,
    SubmitOutcome, ValidationError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    gateway: Arc<Mutex<SqliteGateway>>,
    reference: Arc<ReferenceData>,
    config: ControllerConfig,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn err(data: T, message: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
struct SubmitResponse {
    token: Option<String>,
    records: usize,
    validation_errors: Vec<ValidationError>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/reference - Executive and route dropdown contents
async fn get_reference(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.reference.as_ref().clone()))
}

/// GET /api/records - All stored records
async fn get_records(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.gateway.lock().unwrap();

    match gateway.all_records() {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::ok(records))).into_response(),
        Err(e) => {
            eprintln!("Error getting records: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<sales_collection::FlatRecord>::new(), e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/records/route/:route - Records for one route
async fn get_route_records(
    State(state): State<AppState>,
    Path(route): Path<String>,
) -> impl IntoResponse {
    let gateway = state.gateway.lock().unwrap();

    // Route names contain spaces, so they arrive URL-encoded
    let decoded = urlencoding::decode(&route)
        .unwrap_or_else(|_| route.clone().into())
        .into_owned();

    match gateway.records_by_route(&decoded) {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::ok(records))).into_response(),
        Err(e) => {
            eprintln!("Error getting records for route {}: {}", decoded, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(Vec::<sales_collection::FlatRecord>::new(), e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/stats - Store totals
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.gateway.lock().unwrap();

    match gateway.stats() {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => {
            eprintln!("Error getting stats: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err((), e.to_string())))
                .into_response()
        }
    }
}

/// POST /api/entries - Validate and submit one entry session
async fn submit_entry(
    State(state): State<AppState>,
    Json(session): Json<EntrySession>,
) -> impl IntoResponse {
    let mut controller = SubmissionController::resume(
        session,
        state.reference.as_ref().clone(),
        state.config,
    );

    let mut gateway = state.gateway.lock().unwrap();

    match controller.submit(&mut *gateway) {
        SubmitOutcome::Saved { token, records } => (
            StatusCode::OK,
            Json(ApiResponse::ok(SubmitResponse {
                token: Some(token),
                records,
                validation_errors: vec![],
            })),
        )
            .into_response(),
        SubmitOutcome::Invalid(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::err(
                SubmitResponse {
                    token: None,
                    records: 0,
                    validation_errors: errors,
                },
                "Entry is not submittable".to_string(),
            )),
        )
            .into_response(),
        SubmitOutcome::Failed(error) => {
            let status = if error.is_duplicate() {
                StatusCode::CONFLICT
            } else {
                StatusCode::BAD_GATEWAY
            };
            (
                status,
                Json(ApiResponse::err(
                    SubmitResponse {
                        token: None,
                        records: 0,
                        validation_errors: vec![],
                    },
                    error.to_string(),
                )),
            )
                .into_response()
        }
        SubmitOutcome::AlreadyInFlight => (
            StatusCode::CONFLICT,
            Json(ApiResponse::err(
                SubmitResponse {
                    token: None,
                    records: 0,
                    validation_errors: vec![],
                },
                "A submission is already in progress".to_string(),
            )),
        )
            .into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Daily Sales Collection - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "collections.db".to_string());

    let gateway = SqliteGateway::open(std::path::Path::new(&db_path))
        .expect("Failed to open database");
    println!("✓ Database opened: {}", db_path);

    let state = AppState {
        gateway: Arc::new(Mutex::new(gateway)),
        reference: Arc::new(ReferenceData::builtin()),
        config: ControllerConfig::default(),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/reference", get(get_reference))
        .route("/records", get(get_records))
        .route("/records/route/:route", get(get_route_records))
        .route("/stats", get(get_stats))
        .route("/entries", post(submit_entry))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   Submit:  POST http://localhost:3000/api/entries");
    println!("   Records: GET  http://localhost:3000/api/records");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
