use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::generation::{ChatResult, mime_from_data_url};
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, Role};
use crate::rate_limit::client_key;
use crate::state::AppState;

// Chat handler: admission first, then auth, then the generation call
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
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

    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    let profile = user.profile();
    let start_time = Instant::now();

    let result = if let Some(image) = &payload.image {
        // vision path, the reply continues the client-held history
        let mime_type = mime_from_data_url(image);
        let text = state
            .generation
            .analyze_image(image, mime_type, &profile)
            .await?;

        let mut history = payload.history.unwrap_or_default();
        history.push(ChatMessage {
            role: Role::User,
            content: payload.message.clone(),
        });
        history.push(ChatMessage {
            role: Role::Assistant,
            content: text.clone(),
        });
        ChatResult { text, history }
    } else {
        state
            .generation
            .recommend(&payload.message, &profile, payload.history.unwrap_or_default())
            .await?
    };

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(ChatResponse {
        response: result.text,
        history: result.history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::AuthClient;
    use crate::config::Config;
    use crate::generation::GenerationClient;
    use crate::rate_limit::RateLimiter;

    // port 9 is the discard service, nothing answers there
    fn test_config(max_requests: u32) -> Config {
        Config {
            port: 0,
            generation_url: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            generation_api_key: "test-key".to_string(),
            auth_url: "http://127.0.0.1:9".to_string(),
            rate_limit: max_requests,
            rate_window: Duration::from_secs(60),
            max_retries: 0,
            retry_base: Duration::from_millis(1),
            allowed_origins: Vec::new(),
        }
    }

    fn app(max_requests: u32) -> Router {
        let config = test_config(max_requests);
        let state = Arc::new(AppState {
            generation: GenerationClient::new(&config),
            auth: AuthClient::new(&config),
            limiter: RateLimiter::new(config.rate_window, config.rate_limit),
        });

        Router::new()
            .route("/api/chat", post(chat_handler))
            .with_state(state)
    }

    fn chat_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(r#"{"message":"hello"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected() {
        let app = app(5);

        let response = app.oneshot(chat_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn over_limit_request_gets_429_with_headers() {
        let app = app(1);

        // the admission check runs before auth, so the first call spends
        // the whole window even though it ends in a 401
        let first = app.clone().oneshot(chat_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        let second = app.oneshot(chat_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = second.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "1");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert!(headers.contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn clients_on_distinct_addresses_do_not_share_a_window() {
        let app = app(1);

        let first = app.clone().oneshot(chat_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        let other = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::from(r#"{"message":"hello"}"#))
            .unwrap();
        let second = app.oneshot(other).await.unwrap();
        assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    }
}
