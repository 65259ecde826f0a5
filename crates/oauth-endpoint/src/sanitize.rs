//! Minimal HTML-injection guard for values interpolated into redirect URLs
//! or rendered on the login/consent/error pages.
//!
//! This is not a full HTML encoder: it only trims and neutralizes angle
//! brackets. It runs on raw values, before URL percent-encoding.

/// Trim the value and replace `<` / `>` with their entity forms.
pub fn safe_text(text: &str) -> String {
    text.trim().replace('<', "&lt;").replace('>', "&gt;")
}

/// Optional-propagating form: absent input stays absent.
pub fn safe_text_opt(text: Option<&str>) -> Option<String> {
    text.map(safe_text)
}
