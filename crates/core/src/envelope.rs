//! The `{code, message, data}` response envelope.
//!
//! Endpoints answer either with a raw payload or wrapped in an envelope. An
//! object carrying a `code` field is treated as an envelope; `code == 200` is
//! success and yields `data`, anything else is a rejection whose `message` is
//! shown to the user.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Envelope code signalling success.
pub const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Strip the envelope from a decoded body, if there is one.
pub fn unwrap_envelope(body: Value) -> ApiResult<Value> {
    match body {
        Value::Object(mut map) if map.contains_key("code") => {
            let code = map
                .get("code")
                .and_then(Value::as_i64)
                .ok_or_else(|| ApiError::decode("envelope code is not an integer"))?;

            if code == SUCCESS_CODE {
                Ok(map.remove("data").unwrap_or(Value::Null))
            } else {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Err(ApiError::Rejected { code, message })
            }
        }
        raw => Ok(raw),
    }
}

/// Unwrap and deserialize a body into `T`.
pub fn decode_payload<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    let data = unwrap_envelope(body)?;
    serde_json::from_value(data).map_err(|e| ApiError::decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_yields_data() {
        let body = json!({ "code": 200, "message": "success", "data": { "initialized": true } });
        assert_eq!(unwrap_envelope(body).unwrap(), json!({ "initialized": true }));
    }

    #[test]
    fn success_without_data_yields_null() {
        let body = json!({ "code": 200, "message": "ok" });
        assert_eq!(unwrap_envelope(body).unwrap(), Value::Null);
    }

    #[test]
    fn non_success_code_is_a_rejection_with_message() {
        let body = json!({ "code": 400, "message": "old password is incorrect" });
        assert_eq!(
            unwrap_envelope(body).unwrap_err(),
            ApiError::rejected(400, "old password is incorrect")
        );
    }

    #[test]
    fn raw_payloads_pass_through() {
        let body = json!(["project:read", "task:read"]);
        let codes: Vec<String> = decode_payload(body).unwrap();
        assert_eq!(codes, vec!["project:read", "task:read"]);

        let body = json!({ "initialized": false });
        assert_eq!(unwrap_envelope(body.clone()).unwrap(), body);
    }

    #[test]
    fn shape_mismatch_is_a_decode_error() {
        let body = json!({ "code": 200, "data": "not-a-list" });
        let err = decode_payload::<Vec<String>>(body).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));

        let body = json!({ "code": "200" });
        assert!(matches!(unwrap_envelope(body).unwrap_err(), ApiError::Decode(_)));
    }

    #[test]
    fn envelope_round_trips_through_serde() {
        let env = Envelope::success(vec!["a".to_string()]);
        let value = serde_json::to_value(&env).unwrap();
        assert!(env.is_success());
        assert_eq!(decode_payload::<Vec<String>>(value).unwrap(), vec!["a"]);
    }
}
