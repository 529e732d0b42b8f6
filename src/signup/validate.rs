use lazy_static::lazy_static;
use regex::Regex;

/// RFC 5321 envelope limit.
const MAX_EMAIL_LEN: usize = 254;

/// This many identical characters in a row marks an address as junk.
const MAX_REPEAT_RUN: usize = 5;

/// Trim and lowercase a submitted address. Storage and duplicate detection
/// operate on this form only.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether a normalized address may be stored. Callers report every failure
/// as the same generic invalid-format error; which rule fired is not
/// exposed to the client.
pub(crate) fn is_acceptable_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_GRAMMAR: Regex = Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
        )
        .unwrap();
        static ref MISSING_TLD: Regex = Regex::new(r"^[^@]+@[^.]+$").unwrap();
    }

    email.len() <= MAX_EMAIL_LEN
        && EMAIL_GRAMMAR.is_match(email)
        && !has_repeat_run(email, MAX_REPEAT_RUN)
        && !email.contains("test@test")
        && !MISSING_TLD.is_match(email)
}

/// True when `len` or more identical characters appear consecutively.
fn has_repeat_run(s: &str, len: usize) -> bool {
    let mut prev = None;
    let mut run = 0usize;
    for c in s.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= len {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        for email in [
            "user@example.com",
            "first.last@mail.example.org",
            "user+tag@example.co.uk",
            "a@b.co",
            "user_name-1@sub.domain.io",
        ] {
            assert!(is_acceptable_email(email), "should accept {}", email);
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@@example.com",
            "user @example.com",
            "user@exam ple.com",
            "user@-example.com",
        ] {
            assert!(!is_acceptable_email(email), "should reject {}", email);
        }
    }

    #[test]
    fn rejects_domains_without_a_tld() {
        assert!(!is_acceptable_email("user@localhost"));
        assert!(!is_acceptable_email("user@example"));
        assert!(is_acceptable_email("user@example.com"));
    }

    #[test]
    fn rejects_placeholder_addresses() {
        assert!(!is_acceptable_email("test@test.com"));
        assert!(!is_acceptable_email("test@test"));
    }

    #[test]
    fn rejects_long_repeated_character_runs() {
        assert!(!is_acceptable_email("aaaaa@example.com"));
        assert!(!is_acceptable_email("user@exaaaaample.com"));
        assert!(is_acceptable_email("aaaa@example.com"));
    }

    #[test]
    fn enforces_the_length_limit() {
        let just_fits = format!("{}@example.com", "ab".repeat(121));
        assert_eq!(just_fits.len(), 254);
        assert!(is_acceptable_email(&just_fits));

        let too_long = format!("x{}@example.com", "ab".repeat(121));
        assert_eq!(too_long.len(), 255);
        assert!(!is_acceptable_email(&too_long));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  User@Example.COM  "), "user@example.com");
        assert_eq!(normalize_email("user@example.com"), "user@example.com");
    }
}
