use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn success() -> serde_json::Value {
    json!({ "success": true })
}

pub fn success_message(message: impl Into<String>) -> serde_json::Value {
    json!({ "success": true, "message": message.into() })
}

pub fn failure(message: impl Into<String>) -> serde_json::Value {
    json!({ "success": false, "message": message.into() })
}

/// A request the handler refuses; rendered as a `{success:false}` body.
#[derive(Debug)]
pub struct HandlerErr {
    pub message: String,
}

impl HandlerErr {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn response(self) -> serde_json::Value {
        failure(self.message)
    }
}

impl From<crate::model::InvalidValue> for HandlerErr {
    fn from(e: crate::model::InvalidValue) -> Self {
        Self::new(e.to_string())
    }
}

impl From<crate::guard::GuardError> for HandlerErr {
    fn from(e: crate::guard::GuardError) -> Self {
        Self::new(e.to_string())
    }
}
