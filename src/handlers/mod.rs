mod analyze;
mod chat;
mod health;
mod metrics;

pub use analyze::analyze_handler;
pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
