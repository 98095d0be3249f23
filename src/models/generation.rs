use garde::Validate;
use serde::{Deserialize, Serialize};

/// Body of `POST /generate-image`.
///
/// Fields are optional at the serde layer so that `null` and absent values
/// reach validation instead of failing deserialization.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(default)]
    #[garde(required, length(min = 1))]
    pub prompt: Option<String>,
}

/// Body of `POST /perform-action`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    #[garde(required, length(min = 1))]
    pub custom_id: Option<String>,

    #[serde(default)]
    #[garde(required, length(min = 1))]
    pub task_id: Option<String>,
}

/// Body of `POST /auth`.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query of `GET /download-image`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prompt_fails_validation() {
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_null_and_empty_prompt_fail_validation() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":null}"#).unwrap();
        assert!(req.prompt.is_none());
        assert!(req.validate().is_err());

        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":""}"#).unwrap();
        assert!(req.validate().is_err());

        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":"a red fox"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_action_requires_both_fields() {
        let req: ActionRequest = serde_json::from_str(r#"{"customId":"MJ::JOB::x"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: ActionRequest =
            serde_json::from_str(r#"{"customId":"MJ::JOB::x","taskId":null}"#).unwrap();
        assert!(req.validate().is_err());

        let req: ActionRequest =
            serde_json::from_str(r#"{"customId":"MJ::JOB::x","taskId":"17000"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_null_password_deserializes() {
        let req: AuthRequest = serde_json::from_str(r#"{"password":null}"#).unwrap();
        assert!(req.password.is_none());
    }
}
