//! Request and response models for the API.
//!
//! Field names follow the wire contract used by browser wallet clients,
//! hence the camelCase on the login request.

use serde::{Deserialize, Serialize};

// ============================================================================
// Login Models
// ============================================================================

/// Response carrying a challenge for the wallet to sign.
#[derive(Debug, Serialize)]
pub struct LoginSecretResponse {
    pub secret: String,
}

/// Signed challenge submitted for login.
///
/// Both fields are optional at the serde level so that a missing field is
/// reported as `"<field> required"` rather than a generic body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLoginRequest {
    pub original_message: Option<String>,
    pub signed_message: Option<String>,
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
pub struct VerifyLoginResponse {
    pub token: String,
}

// ============================================================================
// Session Models
// ============================================================================

/// Session introspection. `address` is omitted when there is no valid session.
#[derive(Debug, Serialize)]
pub struct AuthInfoResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// First frame sent on an upgraded connection.
#[derive(Debug, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_camel_case() {
        let req: VerifyLoginRequest = serde_json::from_str(
            r#"{"originalMessage": "a:b:1", "signedMessage": "0x00"}"#,
        )
        .unwrap();
        assert_eq!(req.original_message.as_deref(), Some("a:b:1"));
        assert_eq!(req.signed_message.as_deref(), Some("0x00"));
    }

    #[test]
    fn test_verify_request_missing_fields() {
        let req: VerifyLoginRequest = serde_json::from_str("{}").unwrap();
        assert!(req.original_message.is_none());
        assert!(req.signed_message.is_none());
    }

    #[test]
    fn test_auth_info_omits_absent_address() {
        let anonymous = serde_json::to_value(AuthInfoResponse { address: None }).unwrap();
        assert_eq!(anonymous, serde_json::json!({}));

        let known = serde_json::to_value(AuthInfoResponse {
            address: Some("0xABC".to_string()),
        })
        .unwrap();
        assert_eq!(known["address"], "0xABC");
    }

    #[test]
    fn test_connection_info_serializes_null_address() {
        let info = serde_json::to_value(ConnectionInfo {
            connection_id: "abc".to_string(),
            address: None,
        })
        .unwrap();
        assert!(info["address"].is_null());
    }
}
