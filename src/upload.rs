//! Google Drive upload of the results archive

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::DriveConfig;
use crate::http;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const MULTIPART_BOUNDARY: &str = "site_audit_archive_boundary";

/// Drive client constructed per invocation from explicit credentials.
pub struct DriveClient {
    agent: ureq::Agent,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            agent: http::agent(Duration::from_secs(120)),
            config,
        }
    }

    /// Upload an archive, grant public read access, and return the
    /// shareable link.
    ///
    /// There is no idempotency key: re-invocation creates a fresh file.
    pub fn upload(&self, path: &Path) -> Result<String> {
        let token = self.access_token()?;

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read archive {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("results.zip");

        let metadata = serde_json::json!({ "name": name, "mimeType": "application/zip" });
        let body = multipart_related(&metadata.to_string(), &bytes, MULTIPART_BOUNDARY);

        let created: Value = self
            .agent
            .post(UPLOAD_URL)
            .set("Authorization", &format!("Bearer {}", token))
            .set(
                "Content-Type",
                &format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .send_bytes(&body)
            .map_err(http::read_error)?
            .into_json()
            .context("Failed to parse Drive create response")?;

        let file_id = extract_file_id(&created)?;
        self.allow_public_read(&token, &file_id)?;
        self.fetch_link(&token, &file_id)
    }

    /// Exchange the stored refresh token for an access token.
    fn access_token(&self) -> Result<String> {
        let response: Value = self
            .agent
            .post(TOKEN_URL)
            .send_form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .map_err(http::read_error)?
            .into_json()
            .context("Failed to parse OAuth token response")?;

        response
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .context("OAuth token response lacks access_token")
    }

    fn allow_public_read(&self, token: &str, file_id: &str) -> Result<()> {
        let payload = serde_json::json!({ "role": "reader", "type": "anyone" });
        self.agent
            .post(&format!("{}/{}/permissions", FILES_URL, file_id))
            .set("Authorization", &format!("Bearer {}", token))
            .set("Content-Type", "application/json")
            .send_string(&payload.to_string())
            .map_err(http::read_error)?;
        Ok(())
    }

    fn fetch_link(&self, token: &str, file_id: &str) -> Result<String> {
        let response: Value = self
            .agent
            .get(&format!(
                "{}/{}?fields=webViewLink,webContentLink",
                FILES_URL, file_id
            ))
            .set("Authorization", &format!("Bearer {}", token))
            .call()
            .map_err(http::read_error)?
            .into_json()
            .context("Failed to parse Drive file response")?;

        share_link(&response).context("Drive file response carries no shareable link")
    }
}

/// The created file's id. Fails exactly when the create response carries
/// no id.
fn extract_file_id(created: &Value) -> Result<String> {
    created
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .context("Drive create returned no file id")
}

/// Prefer the browser view link, fall back to the direct download link.
fn share_link(file: &Value) -> Option<String> {
    file.get("webViewLink")
        .and_then(|v| v.as_str())
        .or_else(|| file.get("webContentLink").and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// multipart/related body: a JSON metadata part followed by the archive
/// bytes.
fn multipart_related(metadata: &str, payload: &[u8], boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n",
            boundary, metadata
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{}\r\nContent-Type: application/zip\r\n\r\n", boundary).as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_file_id_present() {
        let created = serde_json::json!({ "id": "abc123" });
        assert_eq!(extract_file_id(&created).unwrap(), "abc123");
    }

    #[test]
    fn test_extract_file_id_missing_is_error() {
        let created = serde_json::json!({ "kind": "drive#file" });
        let err = extract_file_id(&created).unwrap_err();
        assert!(err.to_string().contains("no file id"));
    }

    #[test]
    fn test_extract_file_id_empty_is_error() {
        let created = serde_json::json!({ "id": "" });
        assert!(extract_file_id(&created).is_err());
    }

    #[test]
    fn test_share_link_prefers_view_link() {
        let file = serde_json::json!({
            "webViewLink": "https://drive.google.com/file/d/abc/view",
            "webContentLink": "https://drive.google.com/uc?id=abc",
        });
        assert_eq!(
            share_link(&file).unwrap(),
            "https://drive.google.com/file/d/abc/view"
        );
    }

    #[test]
    fn test_share_link_falls_back_to_content_link() {
        let file = serde_json::json!({ "webContentLink": "https://drive.google.com/uc?id=abc" });
        assert_eq!(
            share_link(&file).unwrap(),
            "https://drive.google.com/uc?id=abc"
        );
        assert!(share_link(&serde_json::json!({})).is_none());
    }

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related("{\"name\":\"results.zip\"}", b"PKDATA", "b0undary");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--b0undary\r\n"));
        assert!(text.contains("Content-Type: application/json; charset=UTF-8"));
        assert!(text.contains("{\"name\":\"results.zip\"}"));
        assert!(text.contains("Content-Type: application/zip"));
        assert!(text.contains("PKDATA"));
        assert!(text.ends_with("\r\n--b0undary--\r\n"));
    }
}
