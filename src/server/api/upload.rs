use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};

use crate::ingest::{EntryInput, KeywordsInput, split_keywords};
use crate::server::AppState;
use crate::server::dto::CreateTextEntryRequest;
use crate::server::response::ApiError;
use crate::server::validation::required;

const UNSUPPORTED_BODY: &str =
    "Request must be either multipart/form-data for files or application/json for text";

fn content_type(request: &Request) -> String {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Classifies the request body as a file upload or a text entry.
pub async fn parse_entry_input(request: Request, state: &Arc<AppState>) -> Result<EntryInput, ApiError> {
    let content_type = content_type(&request);

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?;
        return parse_multipart(multipart).await;
    }

    if content_type.starts_with("application/json") {
        let Json(req) = Json::<CreateTextEntryRequest>::from_request(request, state).await?;
        let content = required(req.content, "Missing content in JSON body")?;
        return Ok(EntryInput::Text {
            content,
            keywords: req.keywords.unwrap_or_default().into_tokens(),
        });
    }

    Err(ApiError::bad_request(UNSUPPORTED_BODY))
}

async fn parse_multipart(mut multipart: Multipart) -> Result<EntryInput, ApiError> {
    let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut keywords = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((data.to_vec(), filename, content_type));
            }
            Some("keywords") => {
                keywords = split_keywords(&field.text().await?);
            }
            _ => {}
        }
    }

    let (data, filename, content_type) =
        file.ok_or_else(|| ApiError::bad_request("File field is required"))?;

    Ok(EntryInput::File {
        data,
        filename,
        content_type,
        keywords,
    })
}
