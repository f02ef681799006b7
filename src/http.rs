use crate::ipc::{self, AppState};
use crate::model::Role;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

type Params = HashMap<String, String>;

const FACULTY_HEADER: &str = "faculty-id";

/// Builds one route handler that forwards to the method router. The `path`
/// form also extracts path parameters.
macro_rules! endpoint {
    ($method:literal, $actor:expr) => {
        |State(state): State<Arc<AppState>>,
         Query(query): Query<Params>,
         headers: HeaderMap,
         body: Bytes| async move {
            call(state, $method, $actor, Params::new(), query, headers, body).await
        }
    };
    ($method:literal, $actor:expr, path) => {
        |State(state): State<Arc<AppState>>,
         Path(path): Path<Params>,
         Query(query): Query<Params>,
         headers: HeaderMap,
         body: Bytes| async move {
            call(state, $method, $actor, path, query, headers, body).await
        }
    };
}

const ADMIN: Option<Role> = Some(Role::Admin);
const FACULTY: Option<Role> = Some(Role::Faculty);
const STUDENT: Option<Role> = Some(Role::Student);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(endpoint!("health", None)))
        .route("/login", post(endpoint!("auth.login", None)))
        .route("/logout", post(endpoint!("auth.logout", None)))
        .route("/session", get(endpoint!("auth.session", None)))
        // admin
        .route("/admin/create-user", post(endpoint!("users.create", ADMIN)))
        .route(
            "/admin/bulk-create-students",
            post(endpoint!("users.bulkCreateStudents", ADMIN)),
        )
        .route("/admin/users/:role", get(endpoint!("users.list", ADMIN, path)))
        .route(
            "/admin/department-years/:department",
            get(endpoint!("cohorts.years", ADMIN, path)),
        )
        .route("/admin/delete-user/:id", delete(endpoint!("users.delete", ADMIN, path)))
        .route("/admin/add-subject", post(endpoint!("subjects.add", ADMIN)))
        .route(
            "/admin/subjects/:department/:year",
            get(endpoint!("subjects.list", ADMIN, path)),
        )
        .route(
            "/admin/delete-subject/:id",
            delete(endpoint!("subjects.delete", ADMIN, path)),
        )
        .route("/admin/add-timetable", post(endpoint!("timetable.upsert", ADMIN)))
        .route("/admin/clear-timetable", delete(endpoint!("timetable.clear", ADMIN)))
        .route("/admin/clear-attendance", delete(endpoint!("attendance.clear", ADMIN)))
        .route("/admin/clear-marks", delete(endpoint!("marks.clear", ADMIN)))
        .route(
            "/admin/delete-attendance/:id",
            delete(endpoint!("attendance.delete", ADMIN, path)),
        )
        .route(
            "/admin/delete-marks/:id",
            delete(endpoint!("marks.delete", ADMIN, path)),
        )
        .route("/admin/attendance-records", get(endpoint!("attendance.list", ADMIN)))
        .route("/admin/marks-records", get(endpoint!("marks.list", ADMIN)))
        // faculty
        .route(
            "/faculty/assigned-subjects",
            get(endpoint!("faculty.assignedSubjects", FACULTY)),
        )
        .route("/faculty/students", get(endpoint!("students.list", FACULTY)))
        .route(
            "/faculty/students/:department/:year",
            get(endpoint!("cohorts.students", FACULTY, path)),
        )
        .route("/faculty/attendance", post(endpoint!("attendance.record", FACULTY)))
        .route("/faculty/marks", post(endpoint!("marks.record", FACULTY)))
        .route(
            "/faculty/check-attendance",
            get(endpoint!("attendance.exists", FACULTY)),
        )
        .route("/faculty/marks-subjects", get(endpoint!("marks.subjects", FACULTY)))
        .route(
            "/faculty/attendance-records",
            get(endpoint!("attendance.list", FACULTY)),
        )
        .route("/faculty/marks-records", get(endpoint!("marks.list", FACULTY)))
        .route(
            "/faculty/delete-attendance/:id",
            delete(endpoint!("attendance.delete", FACULTY, path)),
        )
        .route(
            "/faculty/delete-marks/:id",
            delete(endpoint!("marks.delete", FACULTY, path)),
        )
        // student
        .route(
            "/student/:studentId/timetable",
            get(endpoint!("timetable.forStudent", STUDENT, path)),
        )
        .route(
            "/student/:studentId/attendance",
            get(endpoint!("attendance.studentSummary", STUDENT, path)),
        )
        .route(
            "/student/:studentId/marks",
            get(endpoint!("marks.student", STUDENT, path)),
        )
        .with_state(state)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Flattens one HTTP request into router params. Precedence: path over body
/// over query. The faculty header and bearer token only fill gaps; the route
/// prefix always decides the actor.
fn merge_params(actor: Option<Role>, path: Params, query: Params, headers: &HeaderMap, body: &[u8]) -> Value {
    let mut params: Map<String, Value> = query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
        params.extend(fields);
    }
    params.extend(path.into_iter().map(|(k, v)| (k, Value::String(v))));

    if !params.contains_key("facultyId") {
        if let Some(id) = header_str(headers, FACULTY_HEADER) {
            params.insert("facultyId".to_string(), Value::String(id.to_string()));
        }
    }
    if !params.contains_key("token") {
        if let Some(token) = header_str(headers, header::AUTHORIZATION.as_str()).and_then(|v| v.strip_prefix("Bearer ")) {
            params.insert("token".to_string(), Value::String(token.trim().to_string()));
        }
    }
    if let Some(role) = actor {
        params.insert("actor".to_string(), Value::String(role.as_str().to_string()));
    }
    Value::Object(params)
}

async fn call(
    state: Arc<AppState>,
    method: &'static str,
    actor: Option<Role>,
    path: Params,
    query: Params,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let params = merge_params(actor, path, query, &headers, &body);
    let req = ipc::Request {
        id: method.to_string(),
        method: method.to_string(),
        params,
    };
    let outcome = tokio::task::spawn_blocking(move || ipc::route(&state, &req)).await;
    match outcome {
        Ok(Some(body)) => (StatusCode::OK, Json(body)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": format!("unknown method: {}", method) })),
        ),
        Err(e) => {
            error!(error = %e, method, "handler task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Server error" })),
            )
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn serve(state: Arc<AppState>, bind: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, backend = state.store().backend().as_str(), "http listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
