use crate::db::StoreError;
use crate::guard::{Actor, GuardError};
use crate::ipc::error::{success, success_message, HandlerErr};
use crate::ipc::helpers::{get_actor, get_optional_i64, get_optional_str, get_required_enum, get_required_i64, get_required_str, with_student_names};
use crate::ipc::types::{AppState, Request};
use crate::model::MarksSubmission;
use crate::records::{self, RecordsError};
use serde_json::json;
use tracing::error;

fn marks_record(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let marks = get_required_i64(params, "marks")?;
    if marks < 0 {
        return Err(HandlerErr::new("marks must be a non-negative integer"));
    }
    let submission = MarksSubmission {
        student_id: get_required_str(params, "studentId")?,
        subject_name: get_required_str(params, "subjectName")?,
        exam_type: get_required_enum(params, "examType")?,
        marks,
        faculty_id: get_optional_str(params, "facultyId")
            .ok_or_else(|| HandlerErr::new("facultyId is required"))?,
    };
    match records::record_marks(state.store(), &submission) {
        Ok(()) => Ok(success()),
        Err(StoreError::MissingReference(_)) => Err(HandlerErr::new("Unknown student or faculty")),
        Err(e) => {
            error!(error = %e, "record marks failed");
            Err(HandlerErr::new("Error adding marks"))
        }
    }
}

fn handle_marks_record(state: &AppState, req: &Request) -> serde_json::Value {
    marks_record(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_marks_student(state: &AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(),
    };
    match records::student_marks(state.store(), &student_id) {
        Ok(rows) => json!(rows),
        Err(e) => {
            error!(error = %e, %student_id, "student marks failed");
            json!([])
        }
    }
}

fn handle_marks_subjects(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(faculty_id) = get_optional_str(&req.params, "facultyId") else {
        return json!([]);
    };
    match records::marks_subjects(state.store(), &Actor::Faculty(faculty_id)) {
        Ok(subjects) => json!(subjects),
        Err(e) => {
            error!(error = %e, "marks subjects failed");
            json!([])
        }
    }
}

fn handle_marks_list(state: &AppState, req: &Request) -> serde_json::Value {
    let actor = match get_actor(&req.params) {
        Ok(Ok(a)) => a,
        Ok(Err(_)) => return json!([]),
        Err(e) => return e.response(),
    };
    match records::marks_records(state.store(), &actor) {
        Ok(rows) => with_student_names(state.store(), rows, |r| r.student_id.as_str()),
        Err(e) => {
            error!(error = %e, "marks listing failed");
            json!([])
        }
    }
}

fn marks_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = match get_actor(params)? {
        Ok(a) => a,
        Err(GuardError::MissingIdentity(_)) => return Ok(success_message("Marks record deleted")),
        Err(e) => return Err(e.into()),
    };
    let Some(id) = get_optional_i64(params, "id").ok().flatten() else {
        return Ok(success_message("Marks record deleted"));
    };
    match records::delete_marks(state.store(), &actor, id) {
        Ok(_) => Ok(success_message("Marks record deleted")),
        Err(RecordsError::Guard(e)) => Err(e.into()),
        Err(RecordsError::Store(e)) => {
            error!(error = %e, id, "delete marks failed");
            Err(HandlerErr::new("Error deleting marks record"))
        }
    }
}

fn handle_marks_delete(state: &AppState, req: &Request) -> serde_json::Value {
    marks_delete(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn marks_clear(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = get_actor(params)??;
    match records::clear_marks(state.store(), &actor) {
        Ok(_) => Ok(success_message("All marks cleared")),
        Err(RecordsError::Guard(e)) => Err(e.into()),
        Err(RecordsError::Store(e)) => {
            error!(error = %e, "clear marks failed");
            Err(HandlerErr::new("Error clearing marks"))
        }
    }
}

fn handle_marks_clear(state: &AppState, req: &Request) -> serde_json::Value {
    marks_clear(state, &req.params).unwrap_or_else(HandlerErr::response)
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.record" => Some(handle_marks_record(state, req)),
        "marks.student" => Some(handle_marks_student(state, req)),
        "marks.subjects" => Some(handle_marks_subjects(state, req)),
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        "marks.clear" => Some(handle_marks_clear(state, req)),
        _ => None,
    }
}
