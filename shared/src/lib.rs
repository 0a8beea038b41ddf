use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single percentage below which a subject is failed.
pub const PASS_MARK_PERCENTAGE: f64 = 40.0;

/// Administrative review workflow state. Independent from the computed
/// academic result: a reviewer can mark a record `Pass` even if the
/// student failed the exam, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Pass,
    Fail,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        ReviewStatus::Pending
    }
}

impl ReviewStatus {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Pass => "pass",
            ReviewStatus::Fail => "fail",
        }
    }

    /// Parse from the wire/storage form
    pub fn from_str_lower(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "pass" => Ok(ReviewStatus::Pass),
            "fail" => Ok(ReviewStatus::Fail),
            _ => Err(format!("Invalid review status: {}", s)),
        }
    }

    pub fn all_wire_names() -> [&'static str; 3] {
        ["pending", "pass", "fail"]
    }
}

/// One student's recorded result for one subject on one exam date.
///
/// `(name, subject)` is unique across all records; the database enforces
/// this with a UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: i64,
    pub name: String,
    #[serde(rename = "dob")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "date")]
    pub exam_date: NaiveDate,
    pub subject: String,
    #[serde(rename = "marks")]
    pub marks_obtained: f64,
    #[serde(rename = "outOf")]
    pub max_marks: f64,
    #[serde(rename = "r_status")]
    pub review_status: ReviewStatus,
}

impl Mark {
    /// Computed on demand, never stored, so it can't go stale.
    pub fn percentage(&self) -> f64 {
        percentage(self.marks_obtained, self.max_marks)
    }

    /// "Pass" or "Fail" from the percentage alone.
    pub fn result(&self) -> &'static str {
        result_label(self.percentage())
    }

    /// Wire view of this record with the derived fields attached.
    pub fn to_view(&self) -> MarkView {
        MarkView {
            id: self.id,
            name: self.name.clone(),
            date_of_birth: self.date_of_birth,
            exam_date: self.exam_date,
            subject: self.subject.clone(),
            marks_obtained: self.marks_obtained,
            max_marks: self.max_marks,
            percentage: round2(self.percentage()),
            result: self.result().to_string(),
            review_status: self.review_status,
        }
    }
}

/// `marks_obtained / max_marks * 100`, 0 when `max_marks` is 0.
pub fn percentage(marks_obtained: f64, max_marks: f64) -> f64 {
    if max_marks == 0.0 {
        return 0.0;
    }
    marks_obtained / max_marks * 100.0
}

/// Exactly 40.0 passes.
pub fn result_label(percentage: f64) -> &'static str {
    if percentage >= PASS_MARK_PERCENTAGE {
        "Pass"
    } else {
        "Fail"
    }
}

/// Round to two decimal places for wire output
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A mark as returned by the API: stored fields plus the derived
/// `percentage` (rounded to 2 decimals) and `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "dob")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "date")]
    pub exam_date: NaiveDate,
    pub subject: String,
    #[serde(rename = "marks")]
    pub marks_obtained: f64,
    #[serde(rename = "outOf")]
    pub max_marks: f64,
    pub percentage: f64,
    pub result: String,
    #[serde(rename = "r_status")]
    pub review_status: ReviewStatus,
}

/// A numeric field as JSON clients actually send it: either a number or
/// a string that should parse as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Incoming mark fields for create and partial update. Every field is
/// optional; the validation layer decides which must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "dob", default)]
    pub date_of_birth: Option<String>,
    #[serde(rename = "date", default)]
    pub exam_date: Option<String>,
    #[serde(rename = "marks", default)]
    pub marks_obtained: Option<NumberOrText>,
    #[serde(rename = "outOf", default)]
    pub max_marks: Option<NumberOrText>,
}

/// Body of `PUT /api/marks`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateMarkRequest {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: MarkPayload,
}

/// Body of `DELETE /api/marks`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteMarkRequest {
    pub id: Option<i64>,
}

/// Body of `POST /api/update` (bulk review-status change)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub ids: Option<Vec<i64>>,
    #[serde(rename = "newStatus", default)]
    pub new_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkStatusResponse {
    pub success: bool,
    pub updated_count: u64,
}

/// Body of `POST /api/reset-status`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResetStatusRequest {
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetStatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// One subject row on a scorecard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardLine {
    pub subject: String,
    #[serde(rename = "date")]
    pub exam_date: NaiveDate,
    #[serde(rename = "marks")]
    pub marks_obtained: f64,
    #[serde(rename = "outOf")]
    pub max_marks: f64,
    pub percentage: f64,
    pub result: String,
}

/// Aggregated multi-subject report for one student.
///
/// `overall_status` is "PASS" only when every subject individually
/// passed; it is not derived from `overall_percentage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardReport {
    pub student_name: String,
    pub student_id: i64,
    pub date_of_birth: NaiveDate,
    pub subjects: Vec<ScorecardLine>,
    pub total_obtained_marks: f64,
    pub total_possible_marks: f64,
    pub overall_percentage: f64,
    pub overall_status: String,
}
