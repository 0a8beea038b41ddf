use tracing::info;

use shared::{percentage, round2, ScorecardLine, ScorecardReport};

use crate::db::DbConnection;
use crate::error::MarkError;

/// Aggregates one student's marks into a scorecard. Pure data assembly;
/// rendering is the DocumentRenderer's job.
#[derive(Clone)]
pub struct ScorecardReporter {
    db: DbConnection,
}

impl ScorecardReporter {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Build the report for one student, subjects ordered by exam date.
    ///
    /// `overall_status` is PASS only when every subject individually
    /// passed; a single failing subject fails the whole scorecard even
    /// when the aggregate percentage clears the pass mark.
    pub async fn build_report(&self, student_name: &str) -> Result<ScorecardReport, MarkError> {
        let marks = self.db.marks_by_student(student_name).await?;
        let first = marks.first().ok_or(MarkError::NotFound)?;

        let student_id = first.id;
        let date_of_birth = first.date_of_birth;

        let total_obtained_marks: f64 = marks.iter().map(|m| m.marks_obtained).sum();
        let total_possible_marks: f64 = marks.iter().map(|m| m.max_marks).sum();
        let overall_percentage = if total_possible_marks > 0.0 {
            round2(total_obtained_marks / total_possible_marks * 100.0)
        } else {
            0.0
        };

        let all_passed = marks.iter().all(|m| m.result() == "Pass");
        let overall_status = if all_passed { "PASS" } else { "FAIL" };

        let subjects = marks
            .iter()
            .map(|m| ScorecardLine {
                subject: m.subject.clone(),
                exam_date: m.exam_date,
                marks_obtained: m.marks_obtained,
                max_marks: m.max_marks,
                percentage: round2(percentage(m.marks_obtained, m.max_marks)),
                result: m.result().to_string(),
            })
            .collect();

        info!(
            "Built scorecard for {}: {} subjects, overall {}",
            student_name,
            marks.len(),
            overall_status
        );

        Ok(ScorecardReport {
            student_name: first.name.clone(),
            student_id,
            date_of_birth,
            subjects,
            total_obtained_marks,
            total_possible_marks,
            overall_percentage,
            overall_status: overall_status.to_string(),
        })
    }
}
