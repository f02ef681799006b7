use crate::db::StoreError;
use crate::ipc::error::{success_message, HandlerErr};
use crate::ipc::helpers::{get_required_enum, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Department;
use serde_json::json;
use tracing::error;

fn subjects_add(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let department: Department = get_required_enum(params, "department")?;
    let year = get_required_str(params, "year")?;
    let subject_name = get_required_str(params, "subjectName")?;
    match state.store().insert_subject(department, &year, &subject_name) {
        Ok(id) => Ok(json!({
            "success": true,
            "message": "Subject added successfully",
            "id": id,
        })),
        Err(StoreError::DuplicateKey(_)) => Err(HandlerErr::new("Subject already exists")),
        Err(e) => {
            error!(error = %e, "add subject failed");
            Err(HandlerErr::new("Error adding subject"))
        }
    }
}

fn handle_subjects_add(state: &AppState, req: &Request) -> serde_json::Value {
    subjects_add(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_subjects_list(state: &AppState, req: &Request) -> serde_json::Value {
    let department = match get_required_enum::<Department>(&req.params, "department") {
        Ok(d) => d,
        Err(e) => return e.response(),
    };
    let year = match get_required_str(&req.params, "year") {
        Ok(y) => y,
        Err(e) => return e.response(),
    };
    match state.store().list_subjects(department, &year) {
        Ok(subjects) => json!(subjects),
        Err(e) => {
            error!(error = %e, "list subjects failed");
            json!([])
        }
    }
}

fn handle_subjects_delete(state: &AppState, req: &Request) -> serde_json::Value {
    let id = match get_required_i64(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return e.response(),
    };
    match state.store().delete_subject(id) {
        Ok(_) => success_message("Subject deleted successfully"),
        Err(e) => {
            error!(error = %e, id, "delete subject failed");
            HandlerErr::new("Error deleting subject").response()
        }
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.add" => Some(handle_subjects_add(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
