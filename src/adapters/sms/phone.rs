//! Phone-number normalization.
//!
//! Providers require E.164 destinations; callers hand over whatever their
//! upstream systems stored. Normalization strips separators and resolves
//! the international prefix before every provider call.

use std::sync::LazyLock;

use regex::Regex;

static NON_DIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^0-9+]").expect("static pattern")
});

/// Normalizes a raw phone number into `+<digits>` E.164 form.
///
/// Accepted inputs: `+<cc><number>`, `00<cc><number>`, or a national
/// number when `default_country_code` is configured (a single leading
/// trunk `0` is dropped). Returns `None` when the digit count falls
/// outside the E.164 range of 7 to 15 digits.
pub fn normalize(raw: &str, default_country_code: Option<&str>) -> Option<String> {
    let cleaned = NON_DIAL.replace_all(raw.trim(), "");
    if cleaned.is_empty() {
        return None;
    }

    let digits = if let Some(rest) = cleaned.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        rest.to_string()
    } else if let Some(cc) = default_country_code {
        let national = cleaned.strip_prefix('0').unwrap_or(&cleaned);
        format!("{cc}{national}")
    } else {
        cleaned.into_owned()
    };

    if digits.is_empty() || digits.contains('+') {
        return None;
    }
    if !(7..=15).contains(&digits.len()) {
        return None;
    }

    Some(format!("+{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_e164() {
        assert_eq!(normalize("+15551230001", None).as_deref(), Some("+15551230001"));
    }

    #[test]
    fn test_strips_separators() {
        assert_eq!(
            normalize("+1 (555) 123-0001", None).as_deref(),
            Some("+15551230001")
        );
    }

    #[test]
    fn test_double_zero_prefix() {
        assert_eq!(normalize("0044 20 7946 0000", None).as_deref(), Some("+442079460000"));
    }

    #[test]
    fn test_national_with_country_code() {
        assert_eq!(
            normalize("020 7946 0000", Some("44")).as_deref(),
            Some("+442079460000")
        );
    }

    #[test]
    fn test_bare_digits_without_country_code() {
        assert_eq!(normalize("15551230001", None).as_deref(), Some("+15551230001"));
    }

    #[test]
    fn test_rejects_short_and_long() {
        assert_eq!(normalize("+123", None), None);
        assert_eq!(normalize("+1234567890123456", None), None);
        assert_eq!(normalize("", None), None);
        assert_eq!(normalize("call me", None), None);
    }

    #[test]
    fn test_rejects_embedded_plus() {
        assert_eq!(normalize("+1555+1230001", None), None);
    }
}
