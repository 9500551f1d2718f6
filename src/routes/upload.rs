use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::UploadResponse;
use crate::services::admission::AdmissionError;

/// POST /api/upload_image — submit an image for summarization.
///
/// Multipart form with a `customer_id` text field and an `image` file field.
/// Returns an immediate accept/reject decision; processing happens in the
/// background worker.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<UploadResponse>) {
    let mut customer_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut image_bytes: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(UploadResponse::rejected("Malformed multipart request.")),
                );
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("customer_id") => match field.text().await {
                Ok(text) => customer_id = Some(text),
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(UploadResponse::rejected("Invalid customer_id field.")),
                    );
                }
            },
            Some("image") => {
                file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => image_bytes = Some(bytes.to_vec()),
                    Err(_) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(UploadResponse::rejected("Failed to read image field.")),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    let Some(customer_id) = customer_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse::rejected("Missing customer_id field.")),
        );
    };
    let Some(image_bytes) = image_bytes else {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse::rejected("Missing image field.")),
        );
    };
    let file_name = file_name.unwrap_or_else(|| "upload".to_string());

    // Reject non-image payloads before they reach admission. Empty payloads
    // fall through to the admission controller's own check.
    if !image_bytes.is_empty() && image::guess_format(&image_bytes).is_err() {
        tracing::warn!(customer_id = %customer_id, file_name = %file_name, "Unrecognized image format");
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse::rejected(
                "Invalid file type. Please upload an image (JPEG, PNG, etc.).",
            )),
        );
    }

    tracing::info!(
        customer_id = %customer_id,
        file_name = %file_name,
        size_bytes = image_bytes.len(),
        "Received image upload"
    );

    match state.admission.submit(&customer_id, &file_name, image_bytes).await {
        Ok(request_id) => (
            StatusCode::OK,
            Json(UploadResponse::accepted(
                "Request accepted and queued for processing.",
                request_id,
            )),
        ),
        Err(e) => {
            tracing::warn!(customer_id = %customer_id, file_name = %file_name, reason = %e, "Submission rejected");
            metrics::counter!("submissions_rejected_total").increment(1);

            let status = if e.is_rate_limited() {
                StatusCode::TOO_MANY_REQUESTS
            } else if matches!(e, AdmissionError::StoreUnavailable(_)) {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(UploadResponse::rejected(e.to_string())))
        }
    }
}
