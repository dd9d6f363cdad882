use std::collections::BTreeMap;

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Case-insensitive: `user_password` and `Password` both match `password`.
pub fn is_sensitive(field: &str, sensitive_fields: &[String]) -> bool {
    let field = field.to_ascii_lowercase();
    sensitive_fields
        .iter()
        .any(|s| !s.is_empty() && field.contains(&s.to_ascii_lowercase()))
}

pub fn redact_fields(
    fields: &BTreeMap<String, String>,
    sensitive_fields: &[String],
) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive(name, sensitive_fields) {
                REDACTION_MARKER.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitive() -> Vec<String> {
        vec!["password".to_string(), "card_number".to_string()]
    }

    #[test]
    fn test_matches_case_insensitively() {
        assert!(is_sensitive("Password", &sensitive()));
        assert!(is_sensitive("confirm_password", &sensitive()));
        assert!(!is_sensitive("email", &sensitive()));
    }

    #[test]
    fn test_replaces_only_sensitive_values() {
        let fields: BTreeMap<String, String> = [
            ("email".to_string(), "a@b.c".to_string()),
            ("password".to_string(), "hunter2".to_string()),
        ]
        .into_iter()
        .collect();
        let redacted = redact_fields(&fields, &sensitive());
        assert_eq!(redacted["email"], "a@b.c");
        assert_eq!(redacted["password"], REDACTION_MARKER);
    }
}
