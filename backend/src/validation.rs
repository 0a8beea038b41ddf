use chrono::{Datelike, Local, NaiveDate};
use shared::{MarkPayload, NumberOrText};

use crate::error::MarkError;

/// Students younger than this (in whole years, as of today) are rejected.
pub const MINIMUM_AGE_YEARS: i32 = 15;

/// Validated and normalized mark fields. Only the fields that were
/// present in the payload are `Some`; callers apply exactly those.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedMark {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub exam_date: Option<NaiveDate>,
    pub marks_obtained: Option<f64>,
    pub max_marks: Option<f64>,
}

/// Validate an incoming payload.
///
/// In full mode (`partial = false`) all six fields must be present; in
/// partial mode only supplied fields are checked and omitted ones pass
/// through as `None`. Pure apart from reading today's date.
pub fn validate(payload: &MarkPayload, partial: bool) -> Result<CleanedMark, MarkError> {
    validate_as_of(payload, partial, Local::now().date_naive())
}

/// Same as [`validate`] but with an explicit "today" so the age rule is
/// deterministic under test.
pub fn validate_as_of(
    payload: &MarkPayload,
    partial: bool,
    today: NaiveDate,
) -> Result<CleanedMark, MarkError> {
    let name = payload.name.as_deref().map(str::trim);
    let subject = payload.subject.as_deref().map(str::trim);

    if !partial {
        let complete = name.is_some_and(|s| !s.is_empty())
            && subject.is_some_and(|s| !s.is_empty())
            && payload.date_of_birth.is_some()
            && payload.exam_date.is_some()
            && payload.marks_obtained.is_some()
            && payload.max_marks.is_some();
        if !complete {
            return Err(MarkError::MissingFields);
        }
    } else {
        // A supplied-but-blank name or subject would wipe the record's key
        if name.is_some_and(str::is_empty) || subject.is_some_and(str::is_empty) {
            return Err(MarkError::MissingFields);
        }
    }

    let marks_obtained = parse_number(payload.marks_obtained.as_ref(), "Marks")?;
    let max_marks = parse_number(payload.max_marks.as_ref(), "Out Of")?;

    if marks_obtained.is_some_and(|m| m < 0.0) {
        return Err(MarkError::InvalidNumber("Marks"));
    }
    if max_marks.is_some_and(|m| m <= 0.0) {
        return Err(MarkError::InvalidNumber("Out Of"));
    }
    if let (Some(obtained), Some(max)) = (marks_obtained, max_marks) {
        if obtained > max {
            return Err(MarkError::MarksExceedMax);
        }
    }

    let date_of_birth = parse_date(payload.date_of_birth.as_deref(), "DOB")?;
    if let Some(dob) = date_of_birth {
        if age_in_years(dob, today) < MINIMUM_AGE_YEARS {
            return Err(MarkError::TooYoung);
        }
    }

    let exam_date = parse_date(payload.exam_date.as_deref(), "Exam Date")?;

    Ok(CleanedMark {
        name: name.map(str::to_string),
        subject: subject.map(str::to_string),
        date_of_birth,
        exam_date,
        marks_obtained,
        max_marks,
    })
}

/// Age in whole years: year difference, minus one if today's (month, day)
/// precedes the birth date's.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

fn parse_number(value: Option<&NumberOrText>, field: &'static str) -> Result<Option<f64>, MarkError> {
    match value {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(*n)),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| MarkError::InvalidNumber(field)),
    }
}

fn parse_date(value: Option<&str>, field: &'static str) -> Result<Option<NaiveDate>, MarkError> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| MarkError::InvalidDate(field)),
    }
}
