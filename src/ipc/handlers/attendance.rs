use crate::calc::AttendanceSummary;
use crate::db::StoreError;
use crate::guard::GuardError;
use crate::ipc::error::{success, success_message, HandlerErr};
use crate::ipc::helpers::{get_actor, get_optional_i64, get_optional_str, get_required_enum, get_required_str, with_student_names};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_calendar_date, AttendanceKey, AttendanceSubmission};
use crate::records::{self, RecordsError};
use serde_json::json;
use tracing::{error, warn};

fn parse_key(params: &serde_json::Value) -> Result<AttendanceKey, HandlerErr> {
    Ok(AttendanceKey {
        student_id: get_required_str(params, "studentId")?,
        subject_name: get_required_str(params, "subjectName")?,
        date: parse_calendar_date(&get_required_str(params, "date")?)?,
    })
}

fn attendance_record(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let submission = AttendanceSubmission {
        key: parse_key(params)?,
        status: get_required_enum(params, "status")?,
        faculty_id: get_optional_str(params, "facultyId")
            .ok_or_else(|| HandlerErr::new("facultyId is required"))?,
    };
    match records::record_attendance(state.store(), &submission) {
        Ok(()) => Ok(success()),
        Err(StoreError::MissingReference(_)) => Err(HandlerErr::new("Unknown student or faculty")),
        Err(e) => {
            error!(error = %e, "record attendance failed");
            Err(HandlerErr::new("Error marking attendance"))
        }
    }
}

fn handle_attendance_record(state: &AppState, req: &Request) -> serde_json::Value {
    attendance_record(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_attendance_exists(state: &AppState, req: &Request) -> serde_json::Value {
    let key = match parse_key(&req.params) {
        Ok(k) => k,
        Err(e) => {
            warn!(error = %e.message, "attendance existence check on malformed key");
            return json!({ "hasAttendance": false });
        }
    };
    let has = records::check_attendance_exists(state.store(), &key).unwrap_or_else(|e| {
        error!(error = %e, "attendance existence check failed");
        false
    });
    json!({ "hasAttendance": has })
}

fn handle_attendance_list(state: &AppState, req: &Request) -> serde_json::Value {
    let actor = match get_actor(&req.params) {
        Ok(Ok(a)) => a,
        Ok(Err(_)) => return json!([]),
        Err(e) => return e.response(),
    };
    match records::attendance_records(state.store(), &actor) {
        Ok(rows) => with_student_names(state.store(), rows, |r| r.student_id.as_str()),
        Err(e) => {
            error!(error = %e, "attendance listing failed");
            json!([])
        }
    }
}

fn attendance_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = match get_actor(params)? {
        Ok(a) => a,
        Err(GuardError::MissingIdentity(_)) => return Ok(success_message("Attendance record deleted")),
        Err(e) => return Err(e.into()),
    };
    // An id that cannot name a row matches nothing.
    let Some(id) = get_optional_i64(params, "id").ok().flatten() else {
        return Ok(success_message("Attendance record deleted"));
    };
    match records::delete_attendance(state.store(), &actor, id) {
        Ok(_) => Ok(success_message("Attendance record deleted")),
        Err(RecordsError::Guard(e)) => Err(e.into()),
        Err(RecordsError::Store(e)) => {
            error!(error = %e, id, "delete attendance failed");
            Err(HandlerErr::new("Error deleting attendance record"))
        }
    }
}

fn handle_attendance_delete(state: &AppState, req: &Request) -> serde_json::Value {
    attendance_delete(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn attendance_clear(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = get_actor(params)??;
    match records::clear_attendance(state.store(), &actor) {
        Ok(_) => Ok(success_message("All attendance records cleared")),
        Err(RecordsError::Guard(e)) => Err(e.into()),
        Err(RecordsError::Store(e)) => {
            error!(error = %e, "clear attendance failed");
            Err(HandlerErr::new("Error clearing attendance"))
        }
    }
}

fn handle_attendance_clear(state: &AppState, req: &Request) -> serde_json::Value {
    attendance_clear(state, &req.params).unwrap_or_else(HandlerErr::response)
}

fn handle_attendance_student_summary(state: &AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(),
    };
    let summary = records::student_attendance_summary(state.store(), &student_id).unwrap_or_else(|e| {
        error!(error = %e, %student_id, "attendance summary failed");
        AttendanceSummary::empty()
    });
    json!(summary)
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.record" => Some(handle_attendance_record(state, req)),
        "attendance.exists" => Some(handle_attendance_exists(state, req)),
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.delete" => Some(handle_attendance_delete(state, req)),
        "attendance.clear" => Some(handle_attendance_clear(state, req)),
        "attendance.studentSummary" => Some(handle_attendance_student_summary(state, req)),
        _ => None,
    }
}
