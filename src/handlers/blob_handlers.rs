//! HTTP handlers for blob operations.
//!
//! Handlers only translate between HTTP and `GatewayService`: they pull
//! fields out of the request, call one service operation and map its result
//! (or its classified error) onto the JSON contract.

use crate::{
    errors::AppError,
    handlers::request_scope::RequestScope,
    models::{
        blob::{BlobRecord, display_date},
        upload::UploadRequest,
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the multipart field carrying the file on `POST /upload`.
const UPLOAD_FIELD: &str = "file";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<BlobRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub file_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_name: String,
    pub file_url: String,
    pub content_type: String,
    pub size: u64,
    pub upload_date: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Body of `POST /presigned-upload`. Both fields are required; they are
/// optional here so the error can name every missing one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadReq {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadResponse {
    pub success: bool,
    pub file_name: String,
    pub upload_url: String,
    pub content_type: String,
    pub expires_at: DateTime<Utc>,
}

/// GET `/`: list every blob with its metadata.
pub async fn list_blobs(
    State(service): State<GatewayService>,
    scope: RequestScope,
) -> Result<Json<ListResponse>, AppError> {
    let files = service
        .list_blobs(scope.token())
        .await
        .map_err(|err| AppError::from_store(err, "Failed to list files"))?;

    Ok(Json(ListResponse { files }))
}

/// GET `/{key}`: issue a time-limited download URL.
pub async fn download_ticket(
    State(service): State<GatewayService>,
    Path(key): Path<String>,
    scope: RequestScope,
) -> Result<Json<DownloadResponse>, AppError> {
    let ticket = service
        .download_ticket(&key, scope.token())
        .await
        .map_err(|err| AppError::from_store(err, "Failed to get file URL"))?;

    Ok(Json(DownloadResponse {
        file_url: ticket.url,
        expires_at: ticket.expires_at,
    }))
}

/// POST `/upload`: proxied upload of the multipart field `file`.
pub async fn upload_blob(
    State(service): State<GatewayService>,
    scope: RequestScope,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let Ok(mut multipart) = multipart else {
        return Err(AppError::bad_request("No file provided"));
    };
    let limit = service.max_upload_bytes();

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or(UPLOAD_FIELD).to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let payload = field.bytes().await.map_err(multipart_error)?;
        if payload.len() > limit {
            return Err(too_large(limit));
        }

        upload = Some(UploadRequest {
            original_name,
            payload,
            content_type,
        });
        break;
    }
    let request = upload.ok_or_else(|| AppError::bad_request("No file provided"))?;

    let receipt = service
        .upload_blob(request, scope.token())
        .await
        .map_err(|err| AppError::from_store(err, "Failed to upload file"))?;

    Ok(Json(UploadResponse {
        success: true,
        upload_date: display_date(&receipt.uploaded_at),
        file_name: receipt.key,
        file_url: receipt.public_url,
        content_type: receipt.content_type,
        size: receipt.size_bytes,
    }))
}

/// DELETE `/{key}`: remove a blob. Absent keys answer 404.
pub async fn delete_blob(
    State(service): State<GatewayService>,
    Path(key): Path<String>,
    scope: RequestScope,
) -> Result<Json<DeleteResponse>, AppError> {
    service
        .delete_blob(&key, scope.token())
        .await
        .map_err(|err| AppError::from_store(err, "Failed to delete file"))?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".into(),
    }))
}

/// POST `/presigned-upload`: issue a direct-to-store upload URL.
pub async fn presigned_upload(
    State(service): State<GatewayService>,
    scope: RequestScope,
    payload: Result<Json<PresignedUploadReq>, JsonRejection>,
) -> Result<Json<PresignedUploadResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        AppError::bad_request(format!(
            "fileName and contentType are required: {}",
            rejection.body_text()
        ))
    })?;

    let fields = (non_empty(req.file_name), non_empty(req.content_type));
    let (file_name, content_type) = match fields {
        (Some(file_name), Some(content_type)) => (file_name, content_type),
        (None, None) => {
            return Err(AppError::bad_request(
                "fileName and contentType are required",
            ));
        }
        (None, Some(_)) => return Err(AppError::bad_request("fileName is required")),
        (Some(_), None) => return Err(AppError::bad_request("contentType is required")),
    };

    let ticket = service
        .upload_ticket(&file_name, &content_type, scope.token())
        .await
        .map_err(|err| AppError::from_store(err, "Failed to generate upload URL"))?;

    Ok(Json(PresignedUploadResponse {
        success: true,
        file_name: ticket.generated_key,
        upload_url: ticket.upload_url,
        content_type: ticket.content_type,
        expires_at: ticket.expires_at,
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn too_large(limit: usize) -> AppError {
    AppError::payload_too_large(format!("File exceeds the {} byte upload limit", limit))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large("File exceeds the upload limit")
    } else {
        AppError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}
