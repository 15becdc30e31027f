use std::collections::HashMap;

use axum::extract::Multipart;
use mixtape_social::MediaUpload;

use crate::errors::ServerError;

/// The collected parts of a multipart form: plain text values and files
pub struct FormData {
    texts: HashMap<String, String>,
    files: HashMap<String, MediaUpload>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut texts = HashMap::new();
        let mut files = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?
        {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();

                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

                    files.insert(
                        name,
                        MediaUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

                    texts.insert(name, value);
                }
            }
        }

        Ok(Self { texts, files })
    }

    pub fn text(&self, name: &str) -> Result<String, ServerError> {
        self.optional_text(name)
            .ok_or_else(|| ServerError::BadRequest(format!("{} is required", name)))
    }

    /// Blank values count as absent
    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.texts
            .get(name)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }

    pub fn file(&mut self, name: &str) -> Result<MediaUpload, ServerError> {
        self.optional_file(name)
            .ok_or_else(|| ServerError::BadRequest(format!("{} file is required", name)))
    }

    pub fn optional_file(&mut self, name: &str) -> Option<MediaUpload> {
        self.files.remove(name)
    }
}
