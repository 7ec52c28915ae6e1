//! Redaction helpers shared by the audit log and the report builder.
//!
//! Paths lose user-home segments; context strings lose emails and
//! U.S.-style SSNs and are truncated. None of these helpers ever see raw
//! PAN digits — masking happens in the detector before matches reach
//! this layer.

use std::sync::OnceLock;

use regex::Regex;

fn unix_users() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Users/[^/]+/").unwrap())
}

fn windows_users() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:[A-Za-z]:)?\\Users\\[^\\]+\\").unwrap())
}

fn email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
    })
}

fn ssn() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap())
}

/// Replace user-home segments in a path with a `<user>` placeholder.
pub fn sanitize_path(path: &str) -> String {
    let sanitized = unix_users().replace_all(path, "/Users/<user>/");
    windows_users()
        .replace_all(&sanitized, r"\Users\<user>\")
        .into_owned()
}

/// Redact emails and SSNs from a context string and cap its length.
pub fn redact_context(context: &str) -> String {
    if context.is_empty() {
        return String::new();
    }
    let redacted = email().replace_all(context, "<email>");
    let redacted = ssn().replace_all(&redacted, "<ssn>");
    let mut out = redacted.into_owned();
    if out.chars().count() > 200 {
        out = out.chars().take(200).collect::<String>() + "...";
    }
    out
}

/// Whether a configuration key names a credential whose value must never
/// be written out.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("password") || lower.contains("token") || lower.contains("key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_unix_usernames() {
        assert_eq!(
            sanitize_path("/Users/alice/projects/cards.txt"),
            "/Users/<user>/projects/cards.txt"
        );
    }

    #[test]
    fn strips_windows_usernames() {
        assert_eq!(
            sanitize_path(r"C:\Users\bob\Documents\dump.csv"),
            r"\Users\<user>\Documents\dump.csv"
        );
    }

    #[test]
    fn leaves_other_paths_alone() {
        assert_eq!(sanitize_path("/var/www/html/index.php"), "/var/www/html/index.php");
    }

    #[test]
    fn redacts_emails_and_ssns() {
        let out = redact_context("mail alice@example.com ssn 123-45-6789 end");
        assert_eq!(out, "mail <email> ssn <ssn> end");
    }

    #[test]
    fn truncates_long_context() {
        let long = "a".repeat(300);
        let out = redact_context(&long);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn sensitive_keys_detected_case_insensitively() {
        assert!(is_sensitive_key("api_token"));
        assert!(is_sensitive_key("Password"));
        assert!(is_sensitive_key("client_KEY"));
        assert!(!is_sensitive_key("server_base_url"));
    }
}
