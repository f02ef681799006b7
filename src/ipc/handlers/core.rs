use crate::directory;
use crate::ipc::error::{failure, success, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_enum, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::json;
use tracing::{error, info};

fn handle_health(state: &AppState) -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.store().backend().as_str(),
    })
}

fn login(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("missing password"))?;
    let role: Role = get_required_enum(params, "role")?;

    let user = match directory::authenticate(state.store(), &id, password, role) {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(%id, %role, "login rejected");
            return Err(HandlerErr::new("Invalid credentials"));
        }
        Err(e) => {
            error!(error = %e, "login lookup failed");
            return Err(HandlerErr::new("Server error"));
        }
    };

    let token = state.sessions.create(&user);
    info!(id = %user.id, %role, "login");
    Ok(json!({
        "success": true,
        "role": role,
        "user": {
            "id": user.id,
            "name": user.name,
            "className": user.class_name,
            "rollNo": user.roll_no,
        },
        "token": token,
        "expiresIn": state.sessions.ttl().as_secs(),
    }))
}

fn handle_login(state: &AppState, req: &Request) -> serde_json::Value {
    login(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_logout(state: &AppState, req: &Request) -> serde_json::Value {
    if let Some(token) = get_optional_str(&req.params, "token") {
        state.sessions.remove(&token);
    }
    success()
}

fn handle_session(state: &AppState, req: &Request) -> serde_json::Value {
    let session = get_optional_str(&req.params, "token").and_then(|t| state.sessions.get(&t));
    match session {
        Some(s) => json!({
            "success": true,
            "user": { "id": s.user_id, "name": s.name, "role": s.role },
            "expiresIn": s.remaining().as_secs(),
        }),
        None => failure("Session expired"),
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
