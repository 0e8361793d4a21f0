use serde::{Deserialize, Serialize};

// Chat roles as the web client sends them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

// Chat API request format
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    // data URL of an attached photo, when present
    #[serde(default)]
    pub image: Option<String>,
    // conversation so far, held by the client
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

// Chat API response format
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

// Skincare profile collected during onboarding, stored on the auth user
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub age: Option<String>,
    pub skin_type: Option<String>,
    pub problems: Option<Vec<String>>,
    pub allergies: Option<String>,
    pub goals: Option<String>,
}
