//! Contact form and filename validation.

use std::collections::BTreeSet;

use intake_extract::analysis::file_extension;
use intake_shared::{ContactForm, IntakeError, Result};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_MESSAGE_LENGTH: usize = 1000;
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Placeholder for optional business fields left blank.
pub const NOT_SPECIFIED: &str = "Not specified";
/// Placeholder for optional browser fields left blank.
pub const NOT_PROVIDED: &str = "Not provided";
/// Source recorded when the form does not name one.
pub const DEFAULT_SOURCE: &str = "website";

/// Sequences that may not appear in stored filenames.
const DANGEROUS_SEQUENCES: &[&str] = &["..", "/", "\\", ":", "*", "?", "\"", "<", ">", "|"];

/// Per-field length limits of the enhanced form.
const ENHANCED_LIMITS: &[(&str, usize)] = &[
    ("company", 100),
    ("service", 100),
    ("budget", 50),
    ("source", 50),
    ("userAgent", 500),
    ("pageUrl", 500),
];

/// Contact fields after validation, with every optional field filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedContact {
    pub name: String,
    pub email: String,
    pub message: String,
    pub company: String,
    pub service: String,
    pub budget: String,
    pub source: String,
    pub user_agent: String,
    pub page_url: String,
}

/// Strict validation for the basic contact path: trims every field, checks
/// required fields, email shape and lengths, and fills defaults.
pub fn validate_contact_input(form: &ContactForm) -> Result<ValidatedContact> {
    for (field, value) in [
        ("name", &form.name),
        ("email", &form.email),
        ("message", &form.message),
    ] {
        if value.trim().is_empty() {
            return Err(IntakeError::validation(format!("missing required field: {field}")));
        }
    }

    let email = form.email.trim();
    if !email.contains('@') || !email.contains('.') || email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(IntakeError::validation("invalid email format"));
    }

    let name = form.name.trim();
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(IntakeError::validation(format!(
            "name must be less than {MAX_NAME_LENGTH} characters"
        )));
    }

    let message = form.message.trim();
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(IntakeError::validation(format!(
            "message must be less than {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    Ok(ValidatedContact {
        name: name.to_string(),
        email: email.to_string(),
        message: message.to_string(),
        company: trimmed_or(&form.company, NOT_SPECIFIED),
        service: trimmed_or(&form.service, NOT_SPECIFIED),
        budget: trimmed_or(&form.budget, NOT_SPECIFIED),
        source: trimmed_or(&form.source, DEFAULT_SOURCE),
        user_agent: trimmed_or(&form.user_agent, NOT_PROVIDED),
        page_url: trimmed_or(&form.page_url, NOT_PROVIDED),
    })
}

/// Form-level checks for the enhanced contact path: presence and length
/// limits only, values kept as submitted.
pub fn validate_enhanced_form(form: &ContactForm) -> Result<ValidatedContact> {
    let name_len = form.name.chars().count();
    if name_len == 0 || name_len > MAX_NAME_LENGTH {
        return Err(IntakeError::validation(format!(
            "name must be 1 to {MAX_NAME_LENGTH} characters"
        )));
    }
    if form.email.is_empty() {
        return Err(IntakeError::validation("missing required field: email"));
    }
    let message_len = form.message.chars().count();
    if message_len == 0 || message_len > MAX_MESSAGE_LENGTH {
        return Err(IntakeError::validation(format!(
            "message must be 1 to {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    let optional = [
        &form.company,
        &form.service,
        &form.budget,
        &form.source,
        &form.user_agent,
        &form.page_url,
    ];
    for ((field, limit), value) in ENHANCED_LIMITS.iter().zip(optional) {
        if let Some(value) = value {
            if value.chars().count() > *limit {
                return Err(IntakeError::validation(format!(
                    "{field} must be at most {limit} characters"
                )));
            }
        }
    }

    Ok(ValidatedContact {
        name: form.name.clone(),
        email: form.email.clone(),
        message: form.message.clone(),
        company: form.company.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
        service: form.service.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
        budget: form.budget.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
        source: form.source.clone().unwrap_or_else(|| DEFAULT_SOURCE.into()),
        user_agent: form.user_agent.clone().unwrap_or_else(|| NOT_PROVIDED.into()),
        page_url: form.page_url.clone().unwrap_or_else(|| NOT_PROVIDED.into()),
    })
}

fn trimmed_or(value: &Option<String>, default: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Filenames
// ---------------------------------------------------------------------------

/// Whether a filename is non-empty and free of path or shell metacharacters.
pub fn validate_filename(filename: &str) -> bool {
    !filename.is_empty() && !DANGEROUS_SEQUENCES.iter().any(|s| filename.contains(s))
}

/// Replace dangerous sequences with `_` and cap the length at
/// [`MAX_FILENAME_LENGTH`] characters, keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = filename.to_string();
    for seq in DANGEROUS_SEQUENCES {
        sanitized = sanitized.replace(seq, "_");
    }

    if sanitized.chars().count() <= MAX_FILENAME_LENGTH {
        return sanitized;
    }

    match sanitized.rsplit_once('.') {
        Some((stem, ext)) => {
            let keep = MAX_FILENAME_LENGTH.saturating_sub(ext.chars().count() + 1);
            let stem: String = stem.chars().take(keep).collect();
            format!("{stem}.{ext}")
        }
        None => sanitized.chars().take(MAX_FILENAME_LENGTH).collect(),
    }
}

/// Whether the filename's extension is in the allowed set.
pub fn has_allowed_extension(filename: &str, allowed: &BTreeSet<String>) -> bool {
    !filename.is_empty() && allowed.contains(&file_extension(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.into(),
            email: email.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[test]
    fn fills_defaults_and_trims() {
        let mut input = form("  Ada ", " ada@example.com ", " Hello there ");
        input.company = Some("   ".into());
        input.budget = Some(" $5k ".into());

        let valid = validate_contact_input(&input).expect("valid");
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.email, "ada@example.com");
        assert_eq!(valid.message, "Hello there");
        assert_eq!(valid.company, NOT_SPECIFIED);
        assert_eq!(valid.service, NOT_SPECIFIED);
        assert_eq!(valid.budget, "$5k");
        assert_eq!(valid.source, DEFAULT_SOURCE);
        assert_eq!(valid.user_agent, NOT_PROVIDED);
        assert_eq!(valid.page_url, NOT_PROVIDED);
    }

    #[test]
    fn rejects_missing_required_fields() {
        let err = validate_contact_input(&form("", "a@b.co", "hi")).unwrap_err();
        assert!(err.to_string().contains("name"));
        let err = validate_contact_input(&form("Ada", "a@b.co", "   ")).unwrap_err();
        assert!(err.to_string().contains("message"));
        assert!(err.is_client_error());
    }

    #[test]
    fn rejects_malformed_email() {
        let too_long = format!("{}@x.io", "a".repeat(260));
        for email in ["ada.example.com", "ada@example", too_long.as_str()] {
            assert!(
                validate_contact_input(&form("Ada", email, "hi")).is_err(),
                "{email} accepted"
            );
        }
    }

    #[test]
    fn enforces_length_limits() {
        let long_name = "n".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_contact_input(&form(&long_name, "a@b.co", "hi")).is_err());

        let exact_name = "n".repeat(MAX_NAME_LENGTH);
        assert!(validate_contact_input(&form(&exact_name, "a@b.co", "hi")).is_ok());

        let long_message = "m".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(validate_contact_input(&form("Ada", "a@b.co", &long_message)).is_err());
    }

    #[test]
    fn enhanced_form_keeps_values_and_checks_limits() {
        let mut input = form("Ada", "not-validated", "Hello");
        input.source = Some("landing".into());
        let valid = validate_enhanced_form(&input).expect("valid");
        assert_eq!(valid.email, "not-validated");
        assert_eq!(valid.source, "landing");
        assert_eq!(valid.company, NOT_SPECIFIED);

        input.budget = Some("b".repeat(51));
        let err = validate_enhanced_form(&input).unwrap_err();
        assert!(err.to_string().contains("budget"));

        assert!(validate_enhanced_form(&form("", "x", "y")).is_err());
        assert!(validate_enhanced_form(&form("Ada", "", "y")).is_err());
    }

    #[test]
    fn filename_validation() {
        assert!(validate_filename("report.pdf"));
        assert!(!validate_filename(""));
        assert!(!validate_filename("../etc/passwd"));
        assert!(!validate_filename("a:b.txt"));
        assert!(!validate_filename("what?.txt"));
    }

    #[test]
    fn sanitize_replaces_dangerous_sequences() {
        assert_eq!(sanitize_filename("../a/b.txt"), "__a_b.txt");
        assert_eq!(sanitize_filename("x<y>|z.csv"), "x_y__z.csv");
        assert_eq!(sanitize_filename("plain.txt"), "plain.txt");
    }

    #[test]
    fn sanitize_truncates_but_keeps_extension() {
        let long = format!("{}.pdf", "a".repeat(300));
        let clean = sanitize_filename(&long);
        assert_eq!(clean.chars().count(), MAX_FILENAME_LENGTH);
        assert!(clean.ends_with(".pdf"));

        let no_ext = "b".repeat(300);
        assert_eq!(sanitize_filename(&no_ext).chars().count(), MAX_FILENAME_LENGTH);
    }

    #[test]
    fn extension_allow_list() {
        let allowed: BTreeSet<String> = [".pdf", ".txt"].into_iter().map(String::from).collect();
        assert!(has_allowed_extension("Report.PDF", &allowed));
        assert!(has_allowed_extension("notes.txt", &allowed));
        assert!(!has_allowed_extension("tool.exe", &allowed));
        assert!(!has_allowed_extension("README", &allowed));
        assert!(!has_allowed_extension("", &allowed));
    }
}
