use chrono::Local;
use tracing::{info, warn};

use shared::{MarkPayload, MarkView, ReviewStatus};

use crate::db::{self, DbConnection, NewMark};
use crate::error::MarkError;
use crate::validation::{self, MINIMUM_AGE_YEARS};

/// A student may have at most this many subject records.
pub const MAX_SUBJECTS_PER_STUDENT: i64 = 5;

/// Outcome of a reset request. `NoMatch` is informational, not a hard
/// failure: the id was unknown or the record was already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    NoMatch,
}

/// Orchestrates mark CRUD and the review-status workflow. Holds no
/// state of its own beyond the injected store handle.
#[derive(Clone)]
pub struct MarkService {
    db: DbConnection,
}

impl MarkService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// All marks ordered by (name, subject), with derived fields attached
    pub async fn list(&self) -> Result<Vec<MarkView>, MarkError> {
        let marks = self.db.list_marks().await?;
        Ok(marks.iter().map(|m| m.to_view()).collect())
    }

    /// Validate and persist a new mark
    pub async fn create(&self, payload: MarkPayload) -> Result<MarkView, MarkError> {
        let cleaned = validation::validate(&payload, false)?;

        // Full-mode validation guarantees presence of every field
        let new = NewMark {
            name: require(cleaned.name)?,
            date_of_birth: require(cleaned.date_of_birth)?,
            exam_date: require(cleaned.exam_date)?,
            subject: require(cleaned.subject)?,
            marks_obtained: require(cleaned.marks_obtained)?,
            max_marks: require(cleaned.max_marks)?,
        };

        info!("Creating mark for {} in {}", new.name, new.subject);

        // Fast-path checks; the UNIQUE constraint is the authority
        if self
            .db
            .exists_name_subject(&new.name, &new.subject, None)
            .await?
        {
            return Err(MarkError::DuplicateEntry {
                name: new.name,
                subject: new.subject,
            });
        }
        if self.db.count_by_student(&new.name).await? >= MAX_SUBJECTS_PER_STUDENT {
            return Err(MarkError::SubjectLimitExceeded(new.name));
        }

        let mark = self.db.insert_mark(&new).await.map_err(|e| {
            if db::is_unique_violation(&e) {
                MarkError::DuplicateEntry {
                    name: new.name.clone(),
                    subject: new.subject.clone(),
                }
            } else {
                MarkError::Unexpected(e)
            }
        })?;

        info!("Created mark {} for {}", mark.id, mark.name);
        Ok(mark.to_view())
    }

    /// Apply a partial update to an existing mark.
    ///
    /// Age and score bounds are re-checked against the merged record, not
    /// just the supplied delta; uniqueness is re-checked only when the
    /// name or subject actually changed.
    pub async fn update(&self, id: i64, payload: MarkPayload) -> Result<MarkView, MarkError> {
        let mut mark = self.db.get_mark(id).await?.ok_or(MarkError::NotFound)?;

        let cleaned = validation::validate(&payload, true)?;

        let original_name = mark.name.clone();
        let original_subject = mark.subject.clone();

        if let Some(name) = cleaned.name {
            mark.name = name;
        }
        if let Some(subject) = cleaned.subject {
            mark.subject = subject;
        }
        if let Some(dob) = cleaned.date_of_birth {
            mark.date_of_birth = dob;
        }
        if let Some(exam_date) = cleaned.exam_date {
            mark.exam_date = exam_date;
        }
        if let Some(marks_obtained) = cleaned.marks_obtained {
            mark.marks_obtained = marks_obtained;
        }
        if let Some(max_marks) = cleaned.max_marks {
            mark.max_marks = max_marks;
        }

        if mark.name != original_name || mark.subject != original_subject {
            if self
                .db
                .exists_name_subject(&mark.name, &mark.subject, Some(id))
                .await?
            {
                return Err(MarkError::DuplicateEntry {
                    name: mark.name,
                    subject: mark.subject,
                });
            }
        }

        // Re-validate the merged record before writing anything
        let today = Local::now().date_naive();
        if validation::age_in_years(mark.date_of_birth, today) < MINIMUM_AGE_YEARS {
            return Err(MarkError::TooYoung);
        }
        if mark.marks_obtained > mark.max_marks {
            return Err(MarkError::MarksExceedMax);
        }

        self.db.update_mark(&mark).await.map_err(|e| {
            if db::is_unique_violation(&e) {
                MarkError::DuplicateEntry {
                    name: mark.name.clone(),
                    subject: mark.subject.clone(),
                }
            } else {
                MarkError::Unexpected(e)
            }
        })?;

        info!("Updated mark {}", mark.id);
        Ok(mark.to_view())
    }

    /// Delete a mark by id
    pub async fn delete(&self, id: i64) -> Result<(), MarkError> {
        if !self.db.delete_mark(id).await? {
            warn!("Delete requested for unknown mark {}", id);
            return Err(MarkError::NotFound);
        }
        info!("Deleted mark {}", id);
        Ok(())
    }

    /// Set the review status of every listed mark in one operation.
    /// An empty id list is a valid no-op; missing ids are skipped.
    pub async fn bulk_set_status(
        &self,
        ids: &[i64],
        new_status: &str,
    ) -> Result<u64, MarkError> {
        let status = ReviewStatus::from_str_lower(new_status)
            .map_err(|_| MarkError::InvalidStatus(new_status.to_string()))?;

        let updated = self.db.set_review_status(ids, status).await?;
        info!(
            "Bulk status update: {} of {} ids set to {}",
            updated,
            ids.len(),
            status.as_str()
        );
        Ok(updated)
    }

    /// Reset a mark's review status to pending, only from pass or fail
    pub async fn reset_status(&self, id: i64) -> Result<ResetOutcome, MarkError> {
        let updated = self.db.reset_review_status(id).await?;
        if updated == 0 {
            warn!("Reset matched nothing for mark {}", id);
            Ok(ResetOutcome::NoMatch)
        } else {
            info!("Reset mark {} to pending", id);
            Ok(ResetOutcome::Reset)
        }
    }
}

fn require<T>(value: Option<T>) -> Result<T, MarkError> {
    value.ok_or(MarkError::MissingFields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use shared::NumberOrText;

    async fn setup_service() -> MarkService {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        MarkService::new(db)
    }

    fn payload(name: &str, subject: &str, marks: f64, max: f64) -> MarkPayload {
        MarkPayload {
            name: Some(name.to_string()),
            subject: Some(subject.to_string()),
            date_of_birth: Some("2005-01-01".to_string()),
            exam_date: Some("2023-05-01".to_string()),
            marks_obtained: Some(NumberOrText::Number(marks)),
            max_marks: Some(NumberOrText::Number(max)),
        }
    }

    #[tokio::test]
    async fn test_create_computes_derived_fields() {
        let service = setup_service().await;

        let view = service
            .create(payload("Asha", "Math", 38.0, 80.0))
            .await
            .expect("Create should succeed");

        assert_eq!(view.percentage, 47.5);
        assert_eq!(view.result, "Pass");
        assert_eq!(view.review_status, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name_subject() {
        let service = setup_service().await;

        service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();
        let err = service
            .create(payload("Asha", "Math", 50.0, 80.0))
            .await
            .expect_err("Duplicate should be rejected");
        assert!(matches!(err, MarkError::DuplicateEntry { .. }));
    }

    #[tokio::test]
    async fn test_create_enforces_subject_limit() {
        let service = setup_service().await;

        for subject in ["Math", "Physics", "Chemistry", "Biology"] {
            service
                .create(payload("Asha", subject, 50.0, 100.0))
                .await
                .unwrap();
        }
        // The 5th succeeds
        service
            .create(payload("Asha", "History", 50.0, 100.0))
            .await
            .expect("5th subject should succeed");
        // The 6th is rejected
        let err = service
            .create(payload("Asha", "Geography", 50.0, 100.0))
            .await
            .expect_err("6th subject should be rejected");
        assert!(matches!(err, MarkError::SubjectLimitExceeded(_)));

        // Another student is unaffected
        service
            .create(payload("Ravi", "Geography", 50.0, 100.0))
            .await
            .expect("Other students keep their own count");
    }

    #[tokio::test]
    async fn test_update_partial_fields_only() {
        let service = setup_service().await;

        let created = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();

        let update = MarkPayload {
            marks_obtained: Some(NumberOrText::Number(60.0)),
            ..Default::default()
        };
        let updated = service.update(created.id, update).await.unwrap();

        assert_eq!(updated.marks_obtained, 60.0);
        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.subject, "Math");
        assert_eq!(updated.percentage, 75.0);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let service = setup_service().await;
        let err = service
            .update(42, MarkPayload::default())
            .await
            .expect_err("Unknown id should fail");
        assert!(matches!(err, MarkError::NotFound));
    }

    #[tokio::test]
    async fn test_update_rejects_post_merge_marks_over_max() {
        let service = setup_service().await;

        let created = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();

        // 90 exceeds the stored max of 80 even though the payload alone
        // carries no max to compare against
        let update = MarkPayload {
            marks_obtained: Some(NumberOrText::Number(90.0)),
            ..Default::default()
        };
        let err = service
            .update(created.id, update)
            .await
            .expect_err("Post-merge bound should reject");
        assert!(matches!(err, MarkError::MarksExceedMax));

        // Original record unchanged
        let listed = service.list().await.unwrap();
        assert_eq!(listed[0].marks_obtained, 38.0);
    }

    #[tokio::test]
    async fn test_update_rejects_dob_making_student_too_young() {
        let service = setup_service().await;

        let created = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();

        let ten_years_ago = Local::now()
            .date_naive()
            .with_year(Local::now().date_naive().year() - 10)
            .unwrap();
        let update = MarkPayload {
            date_of_birth: Some(ten_years_ago.format("%Y-%m-%d").to_string()),
            ..Default::default()
        };
        let err = service
            .update(created.id, update)
            .await
            .expect_err("Under-15 dob should be rejected");
        assert!(matches!(err, MarkError::TooYoung));
    }

    #[tokio::test]
    async fn test_update_rechecks_uniqueness_when_subject_changes() {
        let service = setup_service().await;

        service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();
        let physics = service
            .create(payload("Asha", "Physics", 60.0, 80.0))
            .await
            .unwrap();

        let update = MarkPayload {
            subject: Some("Math".to_string()),
            ..Default::default()
        };
        let err = service
            .update(physics.id, update)
            .await
            .expect_err("Renaming onto an existing (name, subject) should fail");
        assert!(matches!(err, MarkError::DuplicateEntry { .. }));

        // Re-saving the same subject does not trip the check
        let same = MarkPayload {
            subject: Some("Physics".to_string()),
            ..Default::default()
        };
        service.update(physics.id, same).await.expect("No-op rename is fine");
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup_service().await;

        let created = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();
        service.delete(created.id).await.expect("Delete should succeed");

        let err = service.delete(created.id).await.expect_err("Already gone");
        assert!(matches!(err, MarkError::NotFound));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_set_status_counts_only_existing_ids() {
        let service = setup_service().await;

        let m1 = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();
        let m2 = service
            .create(payload("Asha", "Physics", 60.0, 80.0))
            .await
            .unwrap();

        let updated = service
            .bulk_set_status(&[m1.id, m2.id, 9999], "pass")
            .await
            .unwrap();
        assert_eq!(updated, 2);

        for view in service.list().await.unwrap() {
            assert_eq!(view.review_status, ReviewStatus::Pass);
        }
    }

    #[tokio::test]
    async fn test_bulk_set_status_empty_ids_is_valid_noop() {
        let service = setup_service().await;
        assert_eq!(service.bulk_set_status(&[], "fail").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_set_status_rejects_unknown_status() {
        let service = setup_service().await;
        let err = service
            .bulk_set_status(&[1], "done")
            .await
            .expect_err("Unknown status should fail");
        assert!(matches!(err, MarkError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_bulk_set_status_allows_any_transition() {
        let service = setup_service().await;
        let mark = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();

        for status in ["pass", "fail", "pass", "pending"] {
            assert_eq!(service.bulk_set_status(&[mark.id], status).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_reset_status_noop_on_pending() {
        let service = setup_service().await;

        let mark = service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();
        assert_eq!(
            service.reset_status(mark.id).await.unwrap(),
            ResetOutcome::NoMatch
        );

        service.bulk_set_status(&[mark.id], "fail").await.unwrap();
        assert_eq!(
            service.reset_status(mark.id).await.unwrap(),
            ResetOutcome::Reset
        );

        assert_eq!(
            service.reset_status(9999).await.unwrap(),
            ResetOutcome::NoMatch
        );
    }

    #[tokio::test]
    async fn test_review_status_independent_of_academic_result() {
        let service = setup_service().await;

        // 30/80 is an academic Fail
        let mark = service.create(payload("Asha", "Math", 30.0, 80.0)).await.unwrap();
        assert_eq!(mark.result, "Fail");

        // The reviewer can still mark it pass
        service.bulk_set_status(&[mark.id], "pass").await.unwrap();
        let listed = service.list().await.unwrap();
        assert_eq!(listed[0].review_status, ReviewStatus::Pass);
        assert_eq!(listed[0].result, "Fail");
    }

    #[tokio::test]
    async fn test_create_validation_runs_before_any_write() {
        let service = setup_service().await;

        let bad = payload("Asha", "Math", 90.0, 80.0);
        assert!(service.create(bad).await.is_err());
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name_then_subject() {
        let service = setup_service().await;

        service.create(payload("Ravi", "Math", 50.0, 100.0)).await.unwrap();
        service.create(payload("Asha", "Physics", 60.0, 80.0)).await.unwrap();
        service.create(payload("Asha", "Math", 38.0, 80.0)).await.unwrap();

        let listed = service.list().await.unwrap();
        let keys: Vec<(String, String)> = listed
            .into_iter()
            .map(|v| (v.name, v.subject))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Asha".to_string(), "Math".to_string()),
                ("Asha".to_string(), "Physics".to_string()),
                ("Ravi".to_string(), "Math".to_string()),
            ]
        );
    }
}
