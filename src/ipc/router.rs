use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::{err, ok};

/// Dispatches to the first handler that claims the method and returns its
/// response body; `None` for unknown methods.
pub fn route(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    handlers::core::try_handle(state, req)
        .or_else(|| handlers::users::try_handle(state, req))
        .or_else(|| handlers::students::try_handle(state, req))
        .or_else(|| handlers::subjects::try_handle(state, req))
        .or_else(|| handlers::timetable::try_handle(state, req))
        .or_else(|| handlers::attendance::try_handle(state, req))
        .or_else(|| handlers::marks::try_handle(state, req))
}

/// Stdio envelope around [`route`].
pub fn handle_request(state: &AppState, req: Request) -> serde_json::Value {
    match route(state, &req) {
        Some(result) => ok(&req.id, result),
        None => err(
            &req.id,
            "not_implemented",
            format!("unknown method: {}", req.method),
            None,
        ),
    }
}
