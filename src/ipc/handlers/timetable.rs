use crate::db::StoreError;
use crate::directory;
use crate::ipc::error::{success_message, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_enum, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::TimetableEntry;
use serde_json::json;
use tracing::error;

fn timetable_upsert(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let entry = TimetableEntry {
        department: get_required_enum(params, "department")?,
        join_year: get_required_str(params, "year")?,
        day_of_week: get_required_enum(params, "dayOfWeek")?,
        time_slot: get_required_enum(params, "timeSlot")?,
        subject_name: get_required_str(params, "subjectName")?,
        faculty_id: get_optional_str(params, "facultyId"),
    };
    match state.store().upsert_timetable(&entry) {
        Ok(()) => Ok(success_message("Timetable updated successfully")),
        Err(StoreError::MissingReference(_)) => Err(HandlerErr::new("Faculty not found")),
        Err(e) => {
            error!(error = %e, "timetable upsert failed");
            Err(HandlerErr::new("Error updating timetable"))
        }
    }
}

fn handle_timetable_upsert(state: &AppState, req: &Request) -> serde_json::Value {
    timetable_upsert(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_timetable_clear(state: &AppState) -> serde_json::Value {
    match state.store().clear_timetable() {
        Ok(_) => success_message("All timetable entries cleared"),
        Err(e) => {
            error!(error = %e, "clear timetable failed");
            HandlerErr::new("Error clearing timetable").response()
        }
    }
}

fn handle_timetable_for_student(state: &AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(),
    };
    match directory::student_timetable(state.store(), &student_id) {
        Ok(slots) => json!(slots),
        Err(e) => {
            error!(error = %e, %student_id, "student timetable failed");
            json!([])
        }
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.upsert" => Some(handle_timetable_upsert(state, req)),
        "timetable.clear" => Some(handle_timetable_clear(state)),
        "timetable.forStudent" => Some(handle_timetable_for_student(state, req)),
        _ => None,
    }
}
