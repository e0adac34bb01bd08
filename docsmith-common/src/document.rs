//! Remote document-generation API bodies.

use serde::{Deserialize, Serialize};

/// Body of `POST /generate-document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateDocumentRequest {
    pub topic: String,
    pub num_pages: u32,
}

/// Response of `POST /generate-document`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDocumentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateDocumentRequest {
            topic: "Quarterly report".to_string(),
            num_pages: 3,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topic"], "Quarterly report");
        assert_eq!(json["num_pages"], 3);
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: GenerateDocumentResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!response.success);
        assert!(response.download_url.is_none());
        assert!(response.filename.is_none());
    }
}
