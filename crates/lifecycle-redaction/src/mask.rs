//! Partial masking for display, keeping enough characters to recognize a value

use crate::redactor::DEFAULT_MARKER;

/// Partially masks emails, phone numbers and card numbers.
/// Values too short or malformed to mask partially fall back to the marker.
#[derive(Debug, Clone)]
pub struct Masker {
    marker: String,
}

impl Default for Masker {
    fn default() -> Self {
        Self::new()
    }
}

impl Masker {
    pub fn new() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Keep the first local-part character and star the rest:
    /// `user@example.com` becomes `u***@example.com`
    pub fn mask_email(&self, email: &str) -> String {
        if email.is_empty() {
            return String::new();
        }

        let Some((local, domain)) = email.split_once('@') else {
            return self.marker.clone();
        };

        if domain.is_empty() || domain.contains('@') {
            return self.marker.clone();
        }

        let mut chars = local.chars();
        match chars.next() {
            Some(first) => format!("{}{}@{}", first, "*".repeat(chars.count()), domain),
            None => self.marker.clone(),
        }
    }

    /// Keep the first two and last two characters: `+1234567890` becomes `+1*******90`
    pub fn mask_phone(&self, phone: &str) -> String {
        let chars: Vec<char> = phone.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }

        let hidden = chars.len() - 4;
        let mut masked: String = chars[..2].iter().collect();
        masked.push_str(&"*".repeat(hidden));
        masked.extend(&chars[chars.len() - 2..]);
        masked
    }

    /// Keep the first four and last four digits, dropping separators
    pub fn mask_card(&self, card: &str) -> String {
        let digits: Vec<char> = card.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 8 {
            return self.marker.clone();
        }

        let mut masked: String = digits[..4].iter().collect();
        masked.push_str(&"*".repeat(digits.len() - 8));
        masked.extend(&digits[digits.len() - 4..]);
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        let masker = Masker::new();
        assert_eq!(masker.mask_email("user@example.com"), "u***@example.com");
        assert_eq!(masker.mask_email("a@b.io"), "a@b.io");
        assert_eq!(masker.mask_email("éric@example.fr"), "é***@example.fr");
    }

    #[test]
    fn test_mask_email_stars_match_local_length() {
        let masker = Masker::default();
        assert_eq!(masker.mask_email("alexander@example.com"), "a********@example.com");
        assert_eq!(masker.mask_email("jo@example.com"), "j*@example.com");
    }

    #[test]
    fn test_mask_email_malformed() {
        let masker = Masker::new();
        assert_eq!(masker.mask_email("not-an-email"), "[REDACTED]");
        assert_eq!(masker.mask_email("@example.com"), "[REDACTED]");
        assert_eq!(masker.mask_email("user@"), "[REDACTED]");
        assert_eq!(masker.mask_email("a@b@example.com"), "[REDACTED]");
        assert_eq!(masker.mask_email(""), "");
    }

    #[test]
    fn test_mask_phone() {
        let masker = Masker::new();
        assert_eq!(masker.mask_phone("+1234567890"), "+1*******90");
        assert_eq!(masker.mask_phone("12345"), "12*45");
        assert_eq!(masker.mask_phone("1234"), "****");
        assert_eq!(masker.mask_phone(""), "");
    }

    #[test]
    fn test_mask_card() {
        let masker = Masker::new();
        assert_eq!(masker.mask_card("4532-1234-5678-9012"), "4532********9012");
        assert_eq!(masker.mask_card("45321234"), "45321234");
        assert_eq!(masker.mask_card("1234"), "[REDACTED]");
    }

    #[test]
    fn test_custom_marker() {
        let masker = Masker::new().with_marker("<hidden>");
        assert_eq!(masker.mask_email("nope"), "<hidden>");
    }
}
