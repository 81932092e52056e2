use serde_json::Value;

use tracker_core::{ApiError, ApiResult, unwrap_envelope};

/// Turn a status code and raw body into a payload or a classified error.
///
/// 2xx bodies are decoded and unwrapped from their envelope (an empty body is
/// `null`). Error bodies are only inspected for a `message` to show.
pub fn classify_response(status: u16, body: &[u8]) -> ApiResult<Value> {
    if (200..300).contains(&status) {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::decode(e.to_string()))?;
        return unwrap_envelope(value);
    }

    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty());

    Err(ApiError::from_status(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_successful_envelopes() {
        let body = br#"{"code":200,"message":"success","data":{"initialized":true}}"#;
        assert_eq!(classify_response(200, body).unwrap(), json!({ "initialized": true }));
    }

    #[test]
    fn empty_success_body_is_null() {
        assert_eq!(classify_response(204, b"").unwrap(), Value::Null);
    }

    #[test]
    fn envelope_rejection_inside_http_200() {
        let body = br#"{"code":400,"message":"old password is incorrect"}"#;
        assert_eq!(
            classify_response(200, body).unwrap_err(),
            ApiError::rejected(400, "old password is incorrect")
        );
    }

    #[test]
    fn http_failures_carry_the_server_message() {
        let body = br#"{"code":409,"message":"username taken"}"#;
        assert_eq!(
            classify_response(409, body).unwrap_err(),
            ApiError::Status { status: 409, message: Some("username taken".into()) }
        );
        assert_eq!(
            classify_response(418, b"<html>teapot</html>").unwrap_err(),
            ApiError::Status { status: 418, message: None }
        );
        assert_eq!(classify_response(401, b"").unwrap_err(), ApiError::Unauthenticated);
    }

    #[test]
    fn garbage_success_body_is_a_decode_error() {
        assert!(matches!(classify_response(200, b"{oops"), Err(ApiError::Decode(_))));
    }
}
