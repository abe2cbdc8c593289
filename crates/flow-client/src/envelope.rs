//! The `{success, statusCode, message, data}` wrapper every REST call returns

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning a failed envelope into `ClientError::Api`
    ///
    /// A successful envelope without `data` is a decode error; use
    /// [`ApiEnvelope::into_unit`] for calls that return nothing.
    pub fn into_result(self) -> Result<T> {
        self.check()?;
        self.data
            .ok_or_else(|| ClientError::Decode("response envelope has no data".to_string()))
    }

    /// Check success and discard any payload
    pub fn into_unit(self) -> Result<()> {
        self.check()
    }

    fn check(&self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let message = if self.message.is_empty() {
                "request failed".to_string()
            } else {
                self.message.clone()
            };
            Err(ClientError::api(self.status_code, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_yields_data() {
        let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_value(json!({
            "success": true,
            "statusCode": 200,
            "message": "ok",
            "data": [1, 2]
        }))
        .unwrap();
        assert_eq!(envelope.into_result().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_failure_maps_to_api_error() {
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_value(json!({
            "success": false,
            "statusCode": 403,
            "message": "forbidden"
        }))
        .unwrap();
        match envelope.into_result() {
            Err(ClientError::Api {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_data() {
        let envelope: ApiEnvelope<u32> =
            serde_json::from_value(json!({"success": true, "statusCode": 200})).unwrap();
        assert!(matches!(envelope.clone().into_result(), Err(ClientError::Decode(_))));
        assert!(envelope.into_unit().is_ok());
    }
}
