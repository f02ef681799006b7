use crate::directory::{self, DirectoryError, NewUser};
use crate::db::UserFilter;
use crate::ipc::error::{success_message, HandlerErr};
use crate::ipc::helpers::{get_optional_enum, get_optional_i64, get_optional_str, get_required_enum, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Department, Role};
use serde_json::json;
use tracing::error;

fn parse_new_user(params: &serde_json::Value, role: Role) -> Result<NewUser, HandlerErr> {
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("missing password"))?;
    let start_year = get_optional_i64(params, "startYear")?
        .map(|y| i32::try_from(y).map_err(|_| HandlerErr::new("startYear out of range")))
        .transpose()?;
    Ok(NewUser {
        role,
        id: get_required_str(params, "id")?,
        password: password.to_string(),
        name: get_required_str(params, "name")?,
        email: get_optional_str(params, "email").unwrap_or_default(),
        class_name: get_optional_str(params, "className"),
        roll_no: get_optional_str(params, "rollNo"),
        department: get_optional_enum::<Department>(params, "department")?,
        start_year,
    })
}

fn users_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role: Role = get_required_enum(params, "role")?;
    let new_user = parse_new_user(params, role)?;
    match directory::create_user(state.store(), new_user) {
        Ok(_) => Ok(success_message(format!("{} created successfully", role))),
        Err(DirectoryError::UserExists) => Err(HandlerErr::new("User ID already exists")),
        Err(DirectoryError::Invalid(e)) => Err(e.into()),
        Err(DirectoryError::Store(e)) => {
            error!(error = %e, "create user failed");
            Err(HandlerErr::new("Error creating user"))
        }
    }
}

fn handle_users_create(state: &AppState, req: &Request) -> serde_json::Value {
    users_create(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_users_bulk_create_students(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(entries) = req.params.get("students").and_then(|v| v.as_array()) else {
        return HandlerErr::new("missing students").response();
    };
    let parsed = entries.iter().map(|entry| {
        parse_new_user(entry, Role::Student).map_err(|e| {
            let id = get_optional_str(entry, "id").unwrap_or_else(|| "?".to_string());
            (id, e.message)
        })
    });
    let outcome = directory::bulk_create_students(state.store(), parsed);
    json!({
        "success": true,
        "message": "Bulk upload completed",
        "created": outcome.created,
        "failed": outcome.failed,
        "errors": outcome.errors,
    })
}

fn handle_users_list(state: &AppState, req: &Request) -> serde_json::Value {
    let role = match get_required_enum::<Role>(&req.params, "role") {
        Ok(r) => r,
        Err(e) => return e.response(),
    };
    let filter = UserFilter {
        role: Some(role),
        ..UserFilter::default()
    };
    match state.store().list_users(&filter) {
        Ok(users) => json!(users),
        Err(e) => {
            error!(error = %e, %role, "list users failed");
            json!([])
        }
    }
}

fn handle_users_delete(state: &AppState, req: &Request) -> serde_json::Value {
    let id = match get_required_str(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return e.response(),
    };
    match state.store().delete_user(&id) {
        Ok(_) => success_message("User deleted successfully"),
        Err(e) => {
            error!(error = %e, %id, "delete user failed");
            HandlerErr::new("Error deleting user").response()
        }
    }
}

fn handle_cohort_years(state: &AppState, req: &Request) -> serde_json::Value {
    let department = match get_required_enum::<Department>(&req.params, "department") {
        Ok(d) => d,
        Err(e) => return e.response(),
    };
    match directory::cohort_years(state.store(), department) {
        Ok(years) => json!(years),
        Err(e) => {
            error!(error = %e, %department, "cohort years failed");
            json!([])
        }
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        "users.bulkCreateStudents" => Some(handle_users_bulk_create_students(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        "cohorts.years" => Some(handle_cohort_years(state, req)),
        _ => None,
    }
}
