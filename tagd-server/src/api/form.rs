//! Form extractor for multipart and urlencoded bodies
//!
//! Upload endpoints take `multipart/form-data`; login and a few admin edits
//! also arrive urlencoded. [`UploadForm`] accepts both, collecting text
//! fields plus the optional `file` part.

use axum::{
    async_trait,
    body::Bytes,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header, StatusCode},
    Form,
};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

/// Uploaded file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side file name
    pub file_name: Option<String>,
    /// Declared content type
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Parsed form body
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl UploadForm {
    /// Text field value; blank values count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Owned text field value; blank values count as absent
    pub fn text_owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// Text field that must be present and non-blank
    pub fn require_text(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing form field: {}", name)))
    }

    /// Take the uploaded file part
    pub fn take_file(&mut self) -> Option<UploadedFile> {
        self.file.take()
    }

    /// Take the uploaded file part, which must be present
    pub fn require_file(&mut self) -> ApiResult<UploadedFile> {
        self.take_file()
            .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut form = UploadForm::default();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                let name = field.name().unwrap_or_default().to_string();

                if name == FILE_FIELD {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                } else {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, value);
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            form.fields = fields;
        } else if !content_type.is_empty() {
            return Err(ApiError::BadRequest(
                "Expected multipart/form-data or application/x-www-form-urlencoded body"
                    .to_string(),
            ));
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn parse(content_type: &str, body: &'static str) -> ApiResult<UploadForm> {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        UploadForm::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_urlencoded_fields() {
        let form = parse(
            "application/x-www-form-urlencoded",
            "username=alice&password=s3cret&note=",
        )
        .await
        .unwrap();

        assert_eq!(form.text("username"), Some("alice"));
        assert_eq!(form.require_text("password").unwrap(), "s3cret");
        assert_eq!(form.text("note"), None);
        assert!(form.require_text("missing").is_err());
    }

    #[tokio::test]
    async fn test_multipart_fields_and_file() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            Beach day\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"beach.jpg\"\r\n\
            Content-Type: image/jpeg\r\n\r\n\
            JPEGDATA\r\n\
            --XYZ--\r\n";

        let mut form = parse("multipart/form-data; boundary=XYZ", body).await.unwrap();

        assert_eq!(form.text("title"), Some("Beach day"));
        let file = form.require_file().unwrap();
        assert_eq!(file.file_name.as_deref(), Some("beach.jpg"));
        assert_eq!(file.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(&file.data[..], b"JPEGDATA");
        assert!(form.take_file().is_none());
    }

    #[tokio::test]
    async fn test_json_body_rejected() {
        let result = parse("application/json", "{}").await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
