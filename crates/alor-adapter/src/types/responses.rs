/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - token exchange and command acknowledgements
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

/// Response of `POST /refresh?token=...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    #[serde(rename = "AccessToken")]
    pub access_token: String,
}

/// Acknowledgement of a command sent over the command socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(rename = "requestGuid")]
    pub request_guid: String,
    #[serde(rename = "httpCode")]
    pub http_code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "orderNumber", default)]
    pub order_number: Option<String>,
}

impl CommandResponse {
    pub fn is_success(&self) -> bool {
        self.http_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_response_failure() {
        let ack: CommandResponse = serde_json::from_str(
            r#"{"requestGuid":"g-1","httpCode":400,"message":"Insufficient funds"}"#,
        )
        .unwrap();
        assert!(!ack.is_success());
        assert_eq!(ack.message.as_deref(), Some("Insufficient funds"));
        assert!(ack.order_number.is_none());
    }
}
