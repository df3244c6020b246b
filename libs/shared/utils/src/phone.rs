//! Chilean phone number normalisation.

use std::sync::OnceLock;

use regex::Regex;

fn staff_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s\-\(\)\.\+]").expect("static regex"))
}

/// Normalises a patient phone to `+56XXXXXXXXX`, returning `None` when the
/// input cannot be interpreted as a Chilean number.
pub fn normalize_chilean_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if raw.starts_with('+') && digits.starts_with("56") {
        return Some(format!("+{}", digits));
    }
    if digits.starts_with("56") {
        return Some(format!("+{}", digits));
    }

    let digits = digits.trim_start_matches('0');

    match digits.len() {
        9 if digits.starts_with('9') => Some(format!("+56{}", digits)),
        8 => Some(format!("+569{}", digits)),
        9 => Some(format!("+56{}", digits)),
        _ => None,
    }
}

/// Staff phones are entered as the last 8 digits of a mobile number.
pub fn normalize_staff_phone(raw: &str) -> Option<String> {
    let cleaned = staff_separators().replace_all(raw.trim(), "");
    let cleaned = cleaned.strip_prefix('0').unwrap_or(&cleaned);

    if cleaned.len() == 8 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("+569{}", cleaned))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_phone_variants() {
        assert_eq!(normalize_chilean_phone("+56 9 1234 5678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_chilean_phone("56912345678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_chilean_phone("912345678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_chilean_phone("1234-5678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_chilean_phone("0912345678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_chilean_phone("221234567").as_deref(), Some("+56221234567"));
    }

    #[test]
    fn patient_phone_rejects_garbage() {
        assert_eq!(normalize_chilean_phone(""), None);
        assert_eq!(normalize_chilean_phone("12345"), None);
        assert_eq!(normalize_chilean_phone("+"), None);
    }

    #[test]
    fn staff_phone_needs_eight_digits() {
        assert_eq!(normalize_staff_phone("1234 5678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_staff_phone("012345678").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_staff_phone("(123) 456-78").as_deref(), Some("+56912345678"));
        assert_eq!(normalize_staff_phone("912345678"), None);
        assert_eq!(normalize_staff_phone("1234abcd"), None);
    }
}
