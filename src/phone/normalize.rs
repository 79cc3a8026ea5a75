//! Phone number canonicalisation.
//!
//! Every number the call core compares is first reduced to one canonical
//! string: digits with an optional leading `+`, and the configured country
//! code prepended when the number is clearly national. `normalize` is
//! total and idempotent.

use crate::settings::RegionSettings;

/// Shown in place of a caller id the telephony layer could not provide.
pub const UNKNOWN_NUMBER: &str = "Unknown Number";

/// Digits only.
pub fn clean_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Digits plus a `+` if one appears before the first digit.
fn strip_to_dialable(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '+' && out.is_empty() {
            out.push(c);
        }
    }
    if out == "+" {
        out.clear();
    }
    out
}

/// Pulls the number out of caller-id strings such as `Jane Doe <+1 555 123 4567>`.
/// Falls back to the whole string when there is no bracketed number.
pub fn extract_from_caller_id(raw: &str) -> String {
    if let (Some(open), Some(close)) = (raw.find('<'), raw.rfind('>')) {
        if open < close {
            let inner = &raw[open + 1..close];
            let looks_like_number = !inner.trim().is_empty()
                && inner
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'));
            if looks_like_number {
                return strip_to_dialable(inner);
            }
        }
    }
    strip_to_dialable(raw)
}

#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    region: RegionSettings,
    prefix: String,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(RegionSettings::default())
    }
}

impl PhoneNormalizer {
    pub fn new(region: RegionSettings) -> Self {
        let prefix = format!("+{}", region.country_code);
        Self { region, prefix }
    }

    pub fn region(&self) -> &RegionSettings {
        &self.region
    }

    pub fn normalize(&self, raw: &str) -> String {
        let stripped = strip_to_dialable(raw);
        if stripped.starts_with('+') {
            // Already international, whether ours (`+91...`) or foreign.
            return stripped;
        }

        let national_len = self.region.national_number_length;
        let code = self.region.country_code.as_str();

        if stripped.len() == code.len() + national_len && stripped.starts_with(code) {
            return format!("+{stripped}");
        }
        if stripped.len() == national_len {
            return format!("{}{stripped}", self.prefix);
        }

        stripped
    }

    /// `+<cc>` followed by a full national number, or any `+` number of
    /// 10 to 15 digits.
    pub fn is_valid(&self, raw: &str) -> bool {
        let normalized = self.normalize(raw);

        if let Some(national) = normalized.strip_prefix(&self.prefix) {
            if national.len() == self.region.national_number_length
                && national.chars().all(|c| c.is_ascii_digit())
            {
                return true;
            }
        }

        match normalized.strip_prefix('+') {
            Some(digits) => (10..=15).contains(&digits.len()),
            None => false,
        }
    }

    /// Human-friendly rendering. Ten-digit national numbers are grouped as
    /// `(XXX) XXX-XXXX`, with `+<cc> ` in front when the country code is present.
    pub fn format_for_display(&self, raw: &str) -> String {
        let digits = clean_digits(raw);
        if digits.is_empty() {
            return "Unknown".into();
        }

        let national_len = self.region.national_number_length;
        let code = self.region.country_code.as_str();

        if national_len == 10 {
            if digits.len() == 10 {
                return group_ten(&digits);
            }
            if digits.len() == code.len() + 10 && digits.starts_with(code) {
                return format!("+{code} {}", group_ten(&digits[code.len()..]));
            }
        }

        digits
    }

    pub fn display_name_for_unknown(&self, raw: &str) -> String {
        let formatted = self.format_for_display(raw);
        if formatted == "Unknown" {
            UNKNOWN_NUMBER.to_string()
        } else {
            formatted
        }
    }
}

fn group_ten(digits: &str) -> String {
    format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
}
