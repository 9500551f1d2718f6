use serde::Serialize;
use uuid::Uuid;

/// Response to an image upload, returned immediately at admission time.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
}

impl UploadResponse {
    pub fn accepted(message: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            success: true,
            message: message.into(),
            request_id: Some(request_id),
            error_info: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error_info: Some(message.clone()),
            message,
            request_id: None,
        }
    }
}
