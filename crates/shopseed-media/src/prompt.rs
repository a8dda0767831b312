/// Appended to every portrait prompt.
pub const PORTRAIT_SUFFIX: &str =
    "A friendly individual posing for a casual profile picture, looking directly at the camera";

pub const PRODUCT_SUFFIX: &str = "product rendering, 1QQQ";

const DEFAULT_PRODUCT_PROMPT: &str = "Default prompt text";

pub fn user_image_prompt(first_name: &str, last_name: &str, role: &str) -> String {
    format!("{first_name} {last_name}, role: {role}\n\n{PORTRAIT_SUFFIX}")
        .trim()
        .to_string()
}

/// Uses the stored prompt, falling back to the description, then a placeholder.
pub fn product_image_prompt(prompt: &str, description: &str) -> String {
    let base = [prompt, description]
        .into_iter()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or(DEFAULT_PRODUCT_PROMPT);
    format!("{base}\n\n{PRODUCT_SUFFIX}")
}
