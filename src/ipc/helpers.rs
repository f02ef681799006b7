use crate::db::RecordStore;
use crate::directory;
use crate::guard::{Actor, GuardError};
use crate::ipc::error::HandlerErr;
use crate::model::{InvalidValue, Role};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::error;

/// String param; numbers are accepted and stringified, blanks count as missing.
pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    let raw = match params.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    get_optional_str(params, key).ok_or_else(|| HandlerErr::new(format!("missing {}", key)))
}

pub fn get_required_enum<T>(params: &Value, key: &str) -> Result<T, HandlerErr>
where
    T: FromStr<Err = InvalidValue>,
{
    Ok(get_required_str(params, key)?.parse::<T>()?)
}

pub fn get_optional_enum<T>(params: &Value, key: &str) -> Result<Option<T>, HandlerErr>
where
    T: FromStr<Err = InvalidValue>,
{
    get_optional_str(params, key)
        .map(|s| s.parse::<T>().map_err(HandlerErr::from))
        .transpose()
}

/// Integer param given either as a JSON integer or a numeric string.
pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::new(format!("{} must be an integer", key))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| HandlerErr::new(format!("{} must be an integer", key))),
        Some(_) => Err(HandlerErr::new(format!("{} must be an integer", key))),
    }
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    get_optional_i64(params, key)?.ok_or_else(|| HandlerErr::new(format!("missing {}", key)))
}

/// `actor` names the role; faculty and student actors are identified by
/// `facultyId` / `studentId`.
pub fn get_actor(params: &Value) -> Result<Result<Actor, GuardError>, HandlerErr> {
    let role: Role = get_required_enum(params, "actor")?;
    let id = match role {
        Role::Admin => None,
        Role::Faculty => get_optional_str(params, "facultyId"),
        Role::Student => get_optional_str(params, "studentId"),
    };
    Ok(Actor::new(role, id.as_deref()))
}

/// Serializes record rows with a `studentName` column. Rows whose student
/// no longer exists are left out.
pub fn with_student_names<T, F>(store: &dyn RecordStore, rows: Vec<T>, student_of: F) -> Value
where
    T: Serialize,
    F: Fn(&T) -> &str,
{
    let names = match directory::user_names(store, Role::Student) {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "student name lookup failed");
            return Value::Array(Vec::new());
        }
    };
    let out: Vec<Value> = rows
        .iter()
        .filter_map(|row| {
            let name = names.get(student_of(row))?;
            let mut v = serde_json::to_value(row).ok()?;
            v.as_object_mut()?
                .insert("studentName".to_string(), Value::String(name.clone()));
            Some(v)
        })
        .collect();
    Value::Array(out)
}
