use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::AnalyzeResponse;
use crate::rate_limit::client_key;
use crate::state::AppState;

// Image formats the analysis endpoint accepts
const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

// Photo analysis handler: multipart upload in, analysis text out
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    REQUEST_TOTAL.inc();

    let decision = state.limiter.check(&client_key(&headers));
    if !decision.admitted {
        RATE_LIMITED_TOTAL.inc();
        return Err(ApiError::RateLimited(decision));
    }

    let user = state
        .auth
        .current_user(&headers)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?;

        upload = Some((content_type, bytes.to_vec()));
        break;
    }

    let Some((content_type, bytes)) = upload else {
        return Err(ApiError::BadRequest("Image is required".to_string()));
    };

    if !ALLOWED_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::BadRequest(
            "Only JPEG, PNG and WebP are supported".to_string(),
        ));
    }

    let profile = user.profile();
    let start_time = Instant::now();

    let encoded = STANDARD.encode(&bytes);
    let analysis = state
        .generation
        .analyze_image(&encoded, &content_type, &profile)
        .await?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(AnalyzeResponse { analysis }))
}
