use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::UserProfile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Current-user answer from the hosted auth service
#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

// Skincare onboarding fields stored on the auth user
#[derive(Debug, Default, Deserialize)]
pub struct UserMetadata {
    pub name: Option<String>,
    pub age: Option<String>,
    pub skin_type: Option<String>,
    pub skin_problems: Option<Vec<String>>,
    pub allergies: Option<String>,
    pub goals: Option<String>,
}

impl AuthUser {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: self.user_metadata.name.clone(),
            age: self.user_metadata.age.clone(),
            skin_type: self.user_metadata.skin_type.clone(),
            problems: self.user_metadata.skin_problems.clone(),
            allergies: self.user_metadata.allergies.clone(),
            goals: self.user_metadata.goals.clone(),
        }
    }
}

// Client for the hosted authentication service (consumed, not reimplemented)
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.auth_url.clone(),
        }
    }

    // Resolve the caller from the bearer token. None means 401 territory;
    // an unreachable auth service is an internal error instead.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<Option<AuthUser>, ApiError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("auth service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let user = response
            .json::<AuthUser>()
            .await
            .map_err(|e| ApiError::Internal(format!("auth service sent malformed user: {}", e)))?;

        Ok(Some(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
