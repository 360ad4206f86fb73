use serde::Serialize;
use serde_json::{json, Value};

use crate::error::IngestError;
use crate::records::ProcessingRecord;

/// Response envelope shared by every command. Success responses flatten the
/// record fields next to `success`; failures carry the message and its stable
/// code.
pub fn success_record(record: &ProcessingRecord) -> Value {
    let mut value = json!(record);
    if let Value::Object(map) = &mut value {
        map.insert("success".to_string(), Value::Bool(true));
    }
    value
}

pub fn success_with<T: Serialize>(key: &str, payload: &T) -> Value {
    json!({
        "success": true,
        key: payload,
    })
}

pub fn failure(err: &IngestError) -> Value {
    json!({
        "success": false,
        "error": err.to_string(),
        "errorCode": err.error_code(),
    })
}

/// Pretty-print an envelope to stdout.
pub fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => tracing::error!(%err, "failed to render output"),
    }
}
