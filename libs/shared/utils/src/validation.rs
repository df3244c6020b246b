use std::sync::OnceLock;

use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 254;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static regex")
    })
}

/// Trims and lowercases an e-mail address, rejecting malformed or oversized input.
pub fn normalize_email(raw: &str) -> Result<String, String> {
    validate_email(raw).map(|email| email.to_lowercase())
}

/// Trims and checks an e-mail address, keeping its case. Stored client
/// e-mails are matched exactly, so lookups against them must not fold case.
pub fn validate_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_string();

    if email.is_empty() {
        return Err("El email es requerido".to_string());
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err("El email es demasiado largo".to_string());
    }
    if !email_pattern().is_match(&email) {
        return Err("Formato de email inválido".to_string());
    }

    Ok(email)
}

/// Escapes a user supplied term for use inside a PostgREST `ilike` pattern.
pub fn ilike_pattern(term: &str) -> String {
    let cleaned: String = term
        .trim()
        .chars()
        .filter(|c| !matches!(c, '*' | ',' | '(' | ')' | '%'))
        .collect();
    format!("*{}*", urlencoding::encode(&cleaned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("").is_err());
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(normalize_email(&long).is_err());
    }

    #[test]
    fn validation_keeps_the_original_case() {
        assert_eq!(
            validate_email(" Ana.Perez@Correo.cl ").unwrap(),
            "Ana.Perez@Correo.cl"
        );
        assert!(validate_email("ana@").is_err());
    }

    #[test]
    fn ilike_pattern_strips_postgrest_syntax() {
        assert_eq!(ilike_pattern("Juan (Pérez)"), "*Juan%20P%C3%A9rez*");
        assert_eq!(ilike_pattern("a,b*"), "*ab*");
    }
}
