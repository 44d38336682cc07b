// `/initial` response models

use serde::{Deserialize, Serialize};

/// Body of a `TEST_CONNECTION` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub conn_status: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// What the backend handed back for a request.
///
/// `FS_SETUP` and `SAVE_SOURCE_SYSTEMS` only signal success through the HTTP status, so their body
/// is never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialResponse {
    Ack,
    ConnectionTest(TestConnectionResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_msg_is_optional() {
        let ok: TestConnectionResponse =
            serde_json::from_str(r#"{"conn_status": true}"#).expect("deserialize");
        assert!(ok.conn_status);
        assert_eq!(ok.error_msg, None);

        let failed: TestConnectionResponse =
            serde_json::from_str(r#"{"conn_status": false, "error_msg": "auth failed"}"#)
                .expect("deserialize");
        assert!(!failed.conn_status);
        assert_eq!(failed.error_msg.as_deref(), Some("auth failed"));
    }
}
