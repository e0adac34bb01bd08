use std::time::Duration;

use docsmith_common::{GenerateDocumentRequest, GenerateDocumentResponse};
use reqwest::Client;

/// Client for the remote document-generation service.
pub struct DocumentClient {
    http_client: Client,
    base_url: String,
}

/// A document the remote service produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub download_url: String,
    pub filename: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Document service error: {0}")]
    ServiceError(String),
    #[error("Document generation was not successful")]
    GenerationFailed,
}

impl DocumentClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, DocumentError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocumentError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the remote service for a document on `request.topic`.
    pub async fn generate(&self, request: &GenerateDocumentRequest) -> Result<GeneratedDocument, DocumentError> {
        let url = format!("{}/generate-document", self.base_url);

        tracing::debug!("Requesting {} page document from {}", request.num_pages, url);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DocumentError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::ServiceError(format!("{}: {}", status, body)));
        }

        let body: GenerateDocumentResponse = response
            .json()
            .await
            .map_err(|e| DocumentError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(DocumentError::GenerationFailed);
        }

        let download_url = body
            .download_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DocumentError::InvalidResponse("missing download_url".to_string()))?;

        let filename = body
            .filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| default_filename(&request.topic));

        Ok(GeneratedDocument { download_url, filename })
    }
}

/// First 30 characters of the topic, with a `.docx` extension.
pub(crate) fn default_filename(topic: &str) -> String {
    let stem: String = topic.trim().chars().take(30).collect();
    format!("{}.docx", stem.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(topic: &str) -> GenerateDocumentRequest {
        GenerateDocumentRequest {
            topic: topic.to_string(),
            num_pages: 4,
        }
    }

    #[tokio::test]
    async fn test_generate_posts_topic_and_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-document"))
            .and(body_json(json!({"topic": "Solar power", "num_pages": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "download_url": "https://files.example/solar.docx",
                "filename": "solar.docx"
            })))
            .mount(&server)
            .await;

        let client = DocumentClient::new(&format!("{}/", server.uri()), 5).unwrap();
        let doc = client.generate(&request("Solar power")).await.unwrap();
        assert_eq!(doc.download_url, "https://files.example/solar.docx");
        assert_eq!(doc.filename, "solar.docx");
    }

    #[tokio::test]
    async fn test_generate_defaults_filename() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-document"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "download_url": "https://files.example/x"
            })))
            .mount(&server)
            .await;

        let client = DocumentClient::new(&server.uri(), 5).unwrap();
        let doc = client.generate(&request("Wind")).await.unwrap();
        assert_eq!(doc.filename, "Wind.docx");
    }

    #[tokio::test]
    async fn test_generate_unsuccessful_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-document"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;

        let client = DocumentClient::new(&server.uri(), 5).unwrap();
        assert!(matches!(
            client.generate(&request("Wind")).await,
            Err(DocumentError::GenerationFailed)
        ));
    }

    #[tokio::test]
    async fn test_generate_missing_url_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-document"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let client = DocumentClient::new(&server.uri(), 5).unwrap();
        assert!(matches!(
            client.generate(&request("Wind")).await,
            Err(DocumentError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_service_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-document"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = DocumentClient::new(&server.uri(), 5).unwrap();
        match client.generate(&request("Wind")).await {
            Err(DocumentError::ServiceError(message)) => assert!(message.contains("overloaded")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_default_filename_truncates_topic() {
        let topic = "A very long topic name that keeps going past thirty characters";
        let name = default_filename(topic);
        assert_eq!(name, "A very long topic name that ke.docx");
        assert_eq!(default_filename("  Short  "), "Short.docx");
    }
}
