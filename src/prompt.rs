use crate::models::UserProfile;

// System prompt for the skincare assistant
pub const SYSTEM_PROMPT: &str = "You are a professional AI skincare consultant. \
Your job is to give personalized facial skincare recommendations.

Follow these rules:
1. Take the user's skin type, age and concerns into account
2. Recommend only safe, well-established methods
3. Warn about possible contraindications
4. Structure answers: analysis first, then recommendations
5. If unsure, advise seeing a dermatologist
6. Do not recommend specific brands, only product categories

Answer format:
- Short analysis of the situation
- 3-5 concrete recommendations
- Order of application (morning/evening)
- Warnings, if any";

// Render the profile as labelled lines for the model context
pub fn format_user_context(profile: &UserProfile) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(name) = non_empty(&profile.name) {
        parts.push(format!("Name: {}", name));
    }
    if let Some(age) = non_empty(&profile.age) {
        parts.push(format!("Age: {}", age));
    }
    if let Some(skin_type) = non_empty(&profile.skin_type) {
        parts.push(format!("Skin type: {}", skin_type));
    }
    if let Some(problems) = profile.problems.as_ref().filter(|p| !p.is_empty()) {
        parts.push(format!("Concerns: {}", problems.join(", ")));
    }
    if let Some(allergies) = non_empty(&profile.allergies) {
        parts.push(format!("Allergies: {}", allergies));
    }
    if let Some(goals) = non_empty(&profile.goals) {
        parts.push(format!("Goals: {}", goals));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("User profile:\n{}", parts.join("\n"))
    }
}

// Prompt for the photo analysis path
pub fn analyze_prompt(user_context: &str) -> String {
    format!(
        "{}\n\nAnalyze this photo of facial skin. Determine:\n\
         1. Overall skin condition\n\
         2. Visible concerns (enlarged pores, acne, pigmentation, etc.)\n\
         3. Skin type, if it can be determined\n\
         4. Care recommendations\n\n\
         Be tactful in your wording and emphasize the positive aspects.",
        user_context
    )
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}
