//! Patient age and sex pulled from report headers.
//!
//! Used when the caller has no demographics of its own; sex selects
//! sex-stratified reference ranges during parsing.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::enums::Sex;

/// Compact "62M" / "45/F" tokens are only trusted inside the header block.
const HEADER_WINDOW: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
}

static AGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "Age: 45", "Age 45", "Age/Sex: 45/M"
        r"(?i)\bage\s*(?:/\s*sex)?\s*[:=]?\s*(\d{1,3})\b",
        // "45 yo", "45 y/o", "45 y.o."
        r"(?i)\b(\d{1,3})\s*(?:yo|y\.o\.?|y/o)\b",
        // "45 year old", "45-year-old", "45 years old"
        r"(?i)\b(\d{1,3})\s*-?\s*years?\s*-?\s*old\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid age regex pattern"))
    .collect()
});

static HEADER_AGE_SEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})\s*/?\s*([MF])(?:[\s,;)]|$)").expect("Invalid header regex pattern")
});

static DOB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:DOB|date\s+of\s+birth|birth\s*date)\s*[:=]\s*(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})",
    )
    .expect("Invalid DOB regex pattern")
});

static SEX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "Sex: M", "Gender: Male"
        r"(?i)\b(?:sex|gender)\s*[:=]\s*(male|female|m|f)\b",
        // "45 yo male", "45 year old woman"
        r"(?i)\b\d{1,3}\s*(?:yo|y\.o\.?|y/o|years?\s*-?\s*old)\s+(male|female|man|woman|m|f)\b",
        // "Age/Sex: 45/M"
        r"(?i)\bage\s*/\s*sex\s*[:=]?\s*\d{1,3}\s*/?\s*(m|f)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid sex regex pattern"))
    .collect()
});

/// Extract age and sex from report text. `today` anchors DOB-based ages so
/// the result is reproducible.
pub fn extract_demographics(text: &str, today: NaiveDate) -> Demographics {
    if text.trim().is_empty() {
        return Demographics::default();
    }
    let header = header_slice(text);

    let age = AGE_PATTERNS
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| parse_age(&c[1])))
        .or_else(|| {
            HEADER_AGE_SEX
                .captures(header)
                .and_then(|c| parse_age(&c[1]))
        })
        .or_else(|| age_from_dob(text, today));

    let sex = SEX_PATTERNS
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| Sex::from_label(&c[1])))
        .or_else(|| {
            HEADER_AGE_SEX
                .captures(header)
                .and_then(|c| Sex::from_label(&c[2]))
        });

    Demographics { age, sex }
}

fn header_slice(text: &str) -> &str {
    if text.len() <= HEADER_WINDOW {
        return text;
    }
    let mut end = HEADER_WINDOW;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn parse_age(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|age| *age <= 120)
}

fn age_from_dob(text: &str, today: NaiveDate) -> Option<u32> {
    let caps = DOB_PATTERN.captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if year < 100 {
        year += if year > 30 { 1900 } else { 2000 };
    }
    let dob = NaiveDate::from_ymd_opt(year, month, day)?;
    if dob > today {
        return None;
    }
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    u32::try_from(age).ok().filter(|a| *a <= 120)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn labeled_age_and_sex() {
        let d = extract_demographics("Patient: Jane Doe\nAge: 58\nSex: F\n", today());
        assert_eq!(d.age, Some(58));
        assert_eq!(d.sex, Some(Sex::Female));
    }

    #[test]
    fn narrative_age_and_sex() {
        let d = extract_demographics("This is a 67 yo male with chest pain.", today());
        assert_eq!(d.age, Some(67));
        assert_eq!(d.sex, Some(Sex::Male));
    }

    #[test]
    fn age_sex_combined_field() {
        let d = extract_demographics("Age/Sex: 62/M\nReferring: Dr. Smith", today());
        assert_eq!(d.age, Some(62));
        assert_eq!(d.sex, Some(Sex::Male));
    }

    #[test]
    fn compact_header_token() {
        let d = extract_demographics("DOE, JOHN 71M\nECHOCARDIOGRAM REPORT", today());
        assert_eq!(d.age, Some(71));
        assert_eq!(d.sex, Some(Sex::Male));
    }

    #[test]
    fn velocity_units_not_mistaken_for_sex() {
        let d = extract_demographics("Peak velocity 2.5 m/s across the valve", today());
        assert_eq!(d.sex, None);
        assert_eq!(d.age, None);
    }

    #[test]
    fn age_from_dob_before_birthday() {
        let d = extract_demographics("DOB: 12/25/1960", today());
        assert_eq!(d.age, Some(65));
    }

    #[test]
    fn age_from_dob_two_digit_year() {
        let d = extract_demographics("Date of Birth: 01/15/55", today());
        assert_eq!(d.age, Some(71));
    }

    #[test]
    fn future_dob_ignored() {
        let d = extract_demographics("DOB: 01/01/2030", today());
        assert_eq!(d.age, None);
    }

    #[test]
    fn implausible_age_ignored() {
        let d = extract_demographics("Age: 450", today());
        assert_eq!(d.age, None);
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(extract_demographics("  ", today()), Demographics::default());
    }
}
