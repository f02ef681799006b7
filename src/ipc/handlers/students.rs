use crate::directory;
use crate::db::UserFilter;
use crate::ipc::helpers::{get_optional_str, get_required_enum, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Department, Role, User};
use serde_json::json;
use tracing::error;

fn roster_row(u: &User) -> serde_json::Value {
    json!({
        "id": u.id,
        "name": u.name,
        "className": u.class_name,
        "rollNo": u.roll_no,
    })
}

fn roster(users: Result<Vec<User>, crate::db::StoreError>, what: &str) -> serde_json::Value {
    match users {
        Ok(users) => json!(users.iter().map(roster_row).collect::<Vec<_>>()),
        Err(e) => {
            error!(error = %e, what, "student roster failed");
            json!([])
        }
    }
}

fn handle_cohort_students(state: &AppState, req: &Request) -> serde_json::Value {
    let department = match get_required_enum::<Department>(&req.params, "department") {
        Ok(d) => d,
        Err(e) => return e.response(),
    };
    let year = match get_required_str(&req.params, "year") {
        Ok(y) => y,
        Err(e) => return e.response(),
    };
    roster(
        directory::cohort_students(state.store(), department, &year),
        "cohort",
    )
}

fn handle_students_list(state: &AppState) -> serde_json::Value {
    let filter = UserFilter {
        role: Some(Role::Student),
        ..UserFilter::default()
    };
    roster(state.store().list_users(&filter), "all")
}

/// Cohorts a faculty member teaches. Without a faculty id there is nothing
/// to look up.
fn handle_assigned_subjects(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(faculty_id) = get_optional_str(&req.params, "facultyId") else {
        return json!([]);
    };
    match directory::assigned_subjects(state.store(), &faculty_id) {
        Ok(subjects) => json!(subjects),
        Err(e) => {
            error!(error = %e, %faculty_id, "assigned subjects failed");
            json!([])
        }
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cohorts.students" => Some(handle_cohort_students(state, req)),
        "students.list" => Some(handle_students_list(state)),
        "faculty.assignedSubjects" => Some(handle_assigned_subjects(state, req)),
        _ => None,
    }
}
