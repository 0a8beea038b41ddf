use printpdf::{BuiltinFont, Mm, PdfDocument};

use shared::ScorecardReport;

use crate::error::MarkError;

/// Narrow seam to the document-output path. The reporter hands over a
/// finished report; implementations only format it.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, report: &ScorecardReport) -> Result<Vec<u8>, MarkError>;
}

/// Renders a scorecard as a single-page A4 PDF with builtin fonts.
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, report: &ScorecardReport) -> Result<Vec<u8>, MarkError> {
        let (doc, page, layer) = PdfDocument::new(
            format!("{} - Scorecard", report.student_name),
            Mm(210.0),
            Mm(297.0),
            "scorecard",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| MarkError::Render(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| MarkError::Render(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        let left = Mm(20.0);
        let mut y = 270.0;

        layer.use_text("Student Scorecard", 18.0, left, Mm(y), &bold);
        y -= 12.0;
        layer.use_text(
            format!("Name: {}   (ID: {})", report.student_name, report.student_id),
            11.0,
            left,
            Mm(y),
            &font,
        );
        y -= 7.0;
        layer.use_text(
            format!("Date of Birth: {}", report.date_of_birth),
            11.0,
            left,
            Mm(y),
            &font,
        );
        y -= 12.0;

        layer.use_text(
            "Subject            Exam Date    Marks    Out Of    %        Result",
            11.0,
            left,
            Mm(y),
            &bold,
        );
        y -= 7.0;
        for line in &report.subjects {
            layer.use_text(
                format!(
                    "{:<18} {}   {:>6.1}   {:>6.1}   {:>6.2}   {}",
                    line.subject,
                    line.exam_date,
                    line.marks_obtained,
                    line.max_marks,
                    line.percentage,
                    line.result
                ),
                11.0,
                left,
                Mm(y),
                &font,
            );
            y -= 7.0;
        }

        y -= 5.0;
        layer.use_text(
            format!(
                "Total: {:.1} / {:.1}   Overall: {:.2}%",
                report.total_obtained_marks, report.total_possible_marks, report.overall_percentage
            ),
            11.0,
            left,
            Mm(y),
            &bold,
        );
        y -= 7.0;
        layer.use_text(
            format!("Overall Status: {}", report.overall_status),
            12.0,
            left,
            Mm(y),
            &bold,
        );

        doc.save_to_bytes()
            .map_err(|e| MarkError::Render(e.to_string()))
    }
}
