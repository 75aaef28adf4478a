//! Asset host client.
//!
//! Uploads a local image and returns the public CDN URL the prediction
//! service will read it from.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::config::ApiConfig;
use super::error::UploadError;

/// Receives upload progress as a fraction in `[0.0, 1.0]`
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Stores a local file and hands back a publicly fetchable URL
#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn upload(&self, file: &Path, progress: ProgressCallback) -> Result<String, UploadError>;
}

/// Uploadcare direct-upload client
pub struct UploadcareClient {
    http: reqwest::Client,
    upload_base: String,
    cdn_base: String,
    public_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: Option<String>,
}

impl UploadcareClient {
    pub fn new(http: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            http,
            upload_base: config.upload_base.clone(),
            cdn_base: config.cdn_base.clone(),
            public_key: SecretString::from(config.asset_host_key().to_string()),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/base/", self.upload_base.trim_end_matches('/'))
    }

    /// Build the public URL for an uploaded file id
    pub(crate) fn cdn_url(cdn_base: &str, file_id: &str) -> String {
        format!("{}/{}/", cdn_base.trim_end_matches('/'), file_id)
    }

    /// Extract the file id from the host's JSON body
    pub(crate) fn parse_file_id(body: &str) -> Result<String, UploadError> {
        let parsed: UploadResponse = serde_json::from_str(body)
            .map_err(|e| UploadError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        parsed
            .file
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| UploadError::MalformedResponse("response has no file id".to_string()))
    }
}

/// Fraction of `total` covered by `sent`, clamped to `[0.0, 1.0]`
pub(crate) fn progress_fraction(sent: u64, total: u64) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (sent as f64 / total as f64).clamp(0.0, 1.0) as f32
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl AssetHost for UploadcareClient {
    async fn upload(&self, file: &Path, progress: ProgressCallback) -> Result<String, UploadError> {
        let metadata = match tokio::fs::metadata(file).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(UploadError::FileNotFound(file.display().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("File not found: {:?}", file);
                return Err(UploadError::FileNotFound(file.display().to_string()));
            }
            Err(e) => return Err(UploadError::IoError(e)),
        };

        let total = metadata.len();
        let handle = tokio::fs::File::open(file).await?;
        info!("Uploading {:?} ({} bytes)", file, total);

        progress(0.0);

        let sent = Arc::new(AtomicU64::new(0));
        let stream_progress = Arc::clone(&progress);
        let stream = ReaderStream::new(handle).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                let done = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
                stream_progress(progress_fraction(done, total));
            }
        });

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.jpg".to_string());

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file_name)
            .mime_str(mime_for(file))
            .map_err(|e| UploadError::RequestFailed(format!("Invalid content type: {}", e)))?;

        let form = Form::new()
            .text(
                "UPLOADCARE_PUB_KEY",
                self.public_key.expose_secret().to_string(),
            )
            .text("UPLOADCARE_STORE", "1")
            .part("file", part);

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Upload request error: {}", e);
                UploadError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!("Upload rejected ({}): {}", status, body);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let file_id = Self::parse_file_id(&body)?;
        let url = Self::cdn_url(&self.cdn_base, &file_id);
        debug!("Upload stored as {}", file_id);

        progress(1.0);
        info!("Upload complete: {}", url);

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::sync::Mutex;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::clients::config::Credentials;

    fn config() -> ApiConfig {
        ApiConfig::with_defaults(Credentials {
            asset_host_public_key: SecretString::from("demopublickey".to_string()),
            prediction_token: SecretString::from("token".to_string()),
        })
    }

    fn client() -> UploadcareClient {
        UploadcareClient::new(reqwest::Client::new(), &config())
    }

    fn client_for(server: &MockServer) -> UploadcareClient {
        let mut config = config();
        config.upload_base = server.uri();
        config.cdn_base = "https://cdn.test".to_string();
        UploadcareClient::new(reqwest::Client::new(), &config)
    }

    fn recording_progress() -> (ProgressCallback, Arc<Mutex<Vec<f32>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        (Arc::new(move |p| recorded.lock().unwrap().push(p)), calls)
    }

    fn write_photo(dir: &Path) -> std::path::PathBuf {
        let file = dir.join("photo.jpg");
        std::fs::write(&file, vec![b'x'; 64 * 1024]).unwrap();
        file
    }

    #[test]
    fn test_cdn_url_has_trailing_slash() {
        let test_cases = vec![
            ("plain base", "https://ucarecdn.com", "https://ucarecdn.com/abc-123/"),
            ("base with slash", "https://ucarecdn.com/", "https://ucarecdn.com/abc-123/"),
            ("custom cdn", "https://cdn.example.org", "https://cdn.example.org/abc-123/"),
        ];

        for (description, base, expected) in test_cases {
            assert_eq!(
                UploadcareClient::cdn_url(base, "abc-123"),
                expected,
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_upload_url_targets_base_endpoint() {
        assert_eq!(client().upload_url(), "https://upload.uploadcare.com/base/");
    }

    #[test]
    fn test_parse_file_id() {
        assert_eq!(
            UploadcareClient::parse_file_id(r#"{"file":"17be4678-dab7-4bc7-8753-28914a22960a"}"#)
                .unwrap(),
            "17be4678-dab7-4bc7-8753-28914a22960a"
        );

        let test_cases = vec![
            ("not json", "<html>oops</html>"),
            ("missing field", r#"{"other":"x"}"#),
            ("empty id", r#"{"file":""}"#),
            ("null id", r#"{"file":null}"#),
        ];

        for (description, body) in test_cases {
            assert!(
                matches!(
                    UploadcareClient::parse_file_id(body),
                    Err(UploadError::MalformedResponse(_))
                ),
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_progress_fraction_bounds() {
        assert_eq!(progress_fraction(0, 200), 0.0);
        assert_eq!(progress_fraction(50, 200), 0.25);
        assert_eq!(progress_fraction(200, 200), 1.0);
        assert_eq!(progress_fraction(300, 200), 1.0);
        assert_eq!(progress_fraction(0, 0), 1.0);
    }

    #[test]
    fn test_mime_for_common_extensions() {
        assert_eq!(mime_for(Path::new("a/photo.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("photo.png")), "image/png");
        assert_eq!(mime_for(Path::new("photo")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_any_request() {
        let (progress, calls) = recording_progress();

        let err = client()
            .upload(Path::new("/definitely/not/here.jpg"), progress)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::FileNotFound(_)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_form_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/base/"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"file":"17be4678-dab7-4bc7-8753-28914a22960a"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = write_photo(dir.path());
        let (progress, calls) = recording_progress();

        let url = client_for(&server).upload(&photo, progress).await.unwrap();
        assert_eq!(url, "https://cdn.test/17be4678-dab7-4bc7-8753-28914a22960a/");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("name=\"UPLOADCARE_PUB_KEY\"\r\n\r\ndemopublickey\r\n"));
        assert!(body.contains("name=\"UPLOADCARE_STORE\"\r\n\r\n1\r\n"));
        assert!(body.contains("name=\"file\"; filename=\"photo.jpg\""));
        assert!(body.to_ascii_lowercase().contains("content-type: image/jpeg"));
        assert!(body.contains(&"x".repeat(64 * 1024)));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.first(), Some(&0.0));
        assert_eq!(calls.last(), Some(&1.0));
        assert!(calls.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(calls.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn test_upload_failures_map_to_typed_errors() {
        let test_cases = vec![
            ("bad public key", 403, "UPLOADCARE_PUB_KEY is invalid."),
            ("server error", 500, ""),
        ];

        for (description, code, body) in test_cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/base/"))
                .respond_with(ResponseTemplate::new(code).set_body_string(body))
                .mount(&server)
                .await;

            let dir = tempfile::tempdir().unwrap();
            let (progress, _) = recording_progress();
            let err = client_for(&server)
                .upload(&write_photo(dir.path()), progress)
                .await
                .unwrap_err();

            match err {
                UploadError::Rejected {
                    status,
                    body: received,
                } => {
                    assert_eq!(status, code, "{}", description);
                    assert_eq!(received, body, "{}", description);
                }
                other => panic!("{}: expected rejection, got {:?}", description, other),
            }
        }
    }

    #[tokio::test]
    async fn test_upload_with_unexpected_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/base/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (progress, _) = recording_progress();
        let err = client_for(&server)
            .upload(&write_photo(dir.path()), progress)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MalformedResponse(_)));
    }
}
