//! Password strength scoring on a 0-100 scale.
//!
//! The score is a pure function of the password text; every password write
//! recomputes it, so stored strength never drifts from the stored password.

/// Score a password 0-100. Deterministic: equal passwords always score equal.
pub fn score_password(password: &str) -> i64 {
    let mut strength: i64 = 0;

    if password.len() >= 8 {
        strength += 20;
    }
    if password.len() >= 12 {
        strength += 10;
    }

    if password.chars().any(|c| c.is_ascii_lowercase()) {
        strength += 10;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        strength += 15;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        strength += 15;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        strength += 20;
    }

    // Single-class passwords and keyboard runs score lower.
    let all_letters = !password.is_empty() && password.chars().all(|c| c.is_ascii_alphabetic());
    let all_digits = !password.is_empty() && password.chars().all(|c| c.is_ascii_digit());
    if all_letters || all_digits {
        strength -= 10;
    }
    if password.contains("123") || password.to_ascii_lowercase().contains("abc") {
        strength -= 5;
    }

    strength.clamp(0, 100)
}

/// Improvement hints for weak passwords; empty once the score reaches 50.
pub fn strength_suggestions(password: &str, strength: i64) -> Vec<String> {
    let mut suggestions = Vec::new();
    if strength >= 50 {
        return suggestions;
    }

    if password.len() < 12 {
        suggestions.push("Make your password longer (at least 12 characters)".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        suggestions.push("Add uppercase letters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        suggestions.push("Add numbers".to_string());
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        suggestions.push("Add special characters".to_string());
    }
    let all_letters = !password.is_empty() && password.chars().all(|c| c.is_ascii_alphabetic());
    let all_digits = !password.is_empty() && password.chars().all(|c| c.is_ascii_digit());
    if all_letters || all_digits {
        suggestions.push("Avoid using only letters or only numbers".to_string());
    }

    suggestions
}
