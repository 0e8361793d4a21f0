use crate::auth::AuthClient;
use crate::generation::GenerationClient;
use crate::rate_limit::RateLimiter;

// App's shared state
pub struct AppState {
    pub generation: GenerationClient,
    pub auth: AuthClient,
    pub limiter: RateLimiter,
}
