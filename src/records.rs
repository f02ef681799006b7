use crate::calc::{self, AttendanceSummary};
use crate::db::{RecordOrder, RecordStore, StoreError};
use crate::guard::{Actor, GuardError};
use crate::model::{AttendanceKey, AttendanceRecord, AttendanceSubmission, MarksRecord, MarksSubmission};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Guard(#[from] GuardError),
}

/// Inserts the record for its natural key or overwrites only its status.
/// Ownership and creation time stay with whoever recorded it first.
pub fn record_attendance(
    store: &dyn RecordStore,
    submission: &AttendanceSubmission,
) -> Result<(), StoreError> {
    store.upsert_attendance(submission)?;
    debug!(
        student = %submission.key.student_id,
        subject = %submission.key.subject_name,
        date = %submission.key.date,
        status = %submission.status,
        faculty = %submission.faculty_id,
        "attendance recorded"
    );
    Ok(())
}

/// Same contract as [`record_attendance`], keyed by exam type; only the
/// marks value changes on resubmission.
pub fn record_marks(store: &dyn RecordStore, submission: &MarksSubmission) -> Result<(), StoreError> {
    store.upsert_marks(submission)?;
    debug!(
        student = %submission.student_id,
        subject = %submission.subject_name,
        exam = %submission.exam_type,
        marks = submission.marks,
        faculty = %submission.faculty_id,
        "marks recorded"
    );
    Ok(())
}

pub fn check_attendance_exists(store: &dyn RecordStore, key: &AttendanceKey) -> Result<bool, StoreError> {
    store.attendance_exists(key)
}

pub fn student_attendance_summary(
    store: &dyn RecordStore,
    student_id: &str,
) -> Result<AttendanceSummary, StoreError> {
    let actor = Actor::Student(student_id.to_string());
    let rows = store.list_attendance(&actor.listing_scope(), RecordOrder::BySubject)?;
    Ok(calc::summarize_attendance(rows))
}

/// Raw marks rows ordered by (subject, exam type). No averaging.
pub fn student_marks(store: &dyn RecordStore, student_id: &str) -> Result<Vec<MarksRecord>, StoreError> {
    let actor = Actor::Student(student_id.to_string());
    store.list_marks(&actor.listing_scope(), RecordOrder::BySubject)
}

pub fn attendance_records(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<AttendanceRecord>, StoreError> {
    store.list_attendance(&actor.listing_scope(), RecordOrder::Recent)
}

pub fn marks_records(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<MarksRecord>, StoreError> {
    store.list_marks(&actor.listing_scope(), RecordOrder::Recent)
}

/// Distinct subjects the actor has entered marks for, alphabetically.
pub fn marks_subjects(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<String>, StoreError> {
    let mut subjects: Vec<String> = store
        .list_marks(&actor.listing_scope(), RecordOrder::BySubject)?
        .into_iter()
        .map(|m| m.subject_name)
        .collect();
    subjects.dedup();
    Ok(subjects)
}

/// Returns the number of rows removed; a foreign or missing id is 0.
pub fn delete_attendance(store: &dyn RecordStore, actor: &Actor, record_id: i64) -> Result<usize, RecordsError> {
    let scope = actor.delete_scope(record_id)?;
    let removed = store.delete_attendance(&scope)?;
    debug!(record_id, removed, role = %actor.role(), "attendance delete");
    Ok(removed)
}

pub fn delete_marks(store: &dyn RecordStore, actor: &Actor, record_id: i64) -> Result<usize, RecordsError> {
    let scope = actor.delete_scope(record_id)?;
    let removed = store.delete_marks(&scope)?;
    debug!(record_id, removed, role = %actor.role(), "marks delete");
    Ok(removed)
}

pub fn clear_attendance(store: &dyn RecordStore, actor: &Actor) -> Result<usize, RecordsError> {
    Ok(store.delete_attendance(&actor.clear_scope()?)?)
}

pub fn clear_marks(store: &dyn RecordStore, actor: &Actor) -> Result<usize, RecordsError> {
    Ok(store.delete_marks(&actor.clear_scope()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{both_backends, student, user};
    use crate::db::RecordFilter;
    use crate::model::{AttendanceStatus, Department, ExamType, Role};
    use chrono::NaiveDate;

    fn seed(store: &dyn RecordStore) {
        store.insert_user(&user("F1", Role::Faculty), "h").expect("F1");
        store.insert_user(&user("F2", Role::Faculty), "h").expect("F2");
        store
            .insert_user(&student("S1", Department::Maths, "2024-2027"), "h")
            .expect("S1");
    }

    fn key(subject: &str, date: &str) -> AttendanceKey {
        AttendanceKey {
            student_id: "S1".to_string(),
            subject_name: subject.to_string(),
            date: date.parse::<NaiveDate>().expect("date"),
        }
    }

    fn mark(store: &dyn RecordStore, subject: &str, date: &str, status: AttendanceStatus, faculty: &str) {
        record_attendance(
            store,
            &AttendanceSubmission {
                key: key(subject, date),
                status,
                faculty_id: faculty.to_string(),
            },
        )
        .expect("record attendance");
    }

    fn marks(store: &dyn RecordStore, subject: &str, exam: ExamType, value: i64, faculty: &str) {
        record_marks(
            store,
            &MarksSubmission {
                student_id: "S1".to_string(),
                subject_name: subject.to_string(),
                exam_type: exam,
                marks: value,
                faculty_id: faculty.to_string(),
            },
        )
        .expect("record marks");
    }

    #[test]
    fn resubmission_keeps_original_owner_and_timestamp() {
        for store in both_backends("portald-records-owner") {
            let store = store.as_ref();
            seed(store);
            mark(store, "Maths", "2024-01-10", AttendanceStatus::Present, "F1");
            let first = store
                .list_attendance(&RecordFilter::default(), RecordOrder::BySubject)
                .expect("list");
            mark(store, "Maths", "2024-01-10", AttendanceStatus::Absent, "F2");

            let rows = store
                .list_attendance(&RecordFilter::default(), RecordOrder::BySubject)
                .expect("list");
            assert_eq!(rows.len(), 1, "{:?}", store.backend());
            assert_eq!(rows[0].status, AttendanceStatus::Absent);
            assert_eq!(rows[0].faculty_id, "F1");
            assert_eq!(rows[0].timestamp, first[0].timestamp);
            assert_eq!(rows[0].id, first[0].id);
        }
    }

    #[test]
    fn marks_resubmission_overwrites_value_only() {
        for store in both_backends("portald-records-marks") {
            let store = store.as_ref();
            seed(store);
            marks(store, "Physics", ExamType::Internal1, 40, "F1");
            marks(store, "Physics", ExamType::Internal1, 55, "F2");
            let rows = student_marks(store, "S1").expect("marks");
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].marks, 55);
            assert_eq!(rows[0].faculty_id, "F1");
        }
    }

    #[test]
    fn student_marks_are_ordered_by_subject_then_exam() {
        for store in both_backends("portald-records-marks-order") {
            let store = store.as_ref();
            seed(store);
            marks(store, "Physics", ExamType::Semester, 60, "F1");
            marks(store, "Maths", ExamType::Internal2, 30, "F1");
            marks(store, "Physics", ExamType::Internal1, 20, "F2");
            marks(store, "Maths", ExamType::Internal1, 25, "F2");
            let order: Vec<(String, ExamType)> = student_marks(store, "S1")
                .expect("marks")
                .into_iter()
                .map(|m| (m.subject_name, m.exam_type))
                .collect();
            assert_eq!(
                order,
                vec![
                    ("Maths".to_string(), ExamType::Internal1),
                    ("Maths".to_string(), ExamType::Internal2),
                    ("Physics".to_string(), ExamType::Internal1),
                    ("Physics".to_string(), ExamType::Semester),
                ]
            );
            assert_eq!(
                marks_subjects(store, &Actor::Faculty("F2".to_string())).expect("subjects"),
                vec!["Maths".to_string(), "Physics".to_string()]
            );
        }
    }

    #[test]
    fn exists_check_does_not_mutate() {
        for store in both_backends("portald-records-exists") {
            let store = store.as_ref();
            seed(store);
            assert!(!check_attendance_exists(store, &key("Maths", "2024-01-10")).expect("exists"));
            mark(store, "Maths", "2024-01-10", AttendanceStatus::Present, "F1");
            assert!(check_attendance_exists(store, &key("Maths", "2024-01-10")).expect("exists"));
            assert!(!check_attendance_exists(store, &key("Maths", "2024-01-11")).expect("exists"));
            assert_eq!(student_attendance_summary(store, "S1").expect("summary").total_classes, 1);
        }
    }

    #[test]
    fn summary_matches_on_both_backends() {
        let mut summaries = Vec::new();
        for store in both_backends("portald-records-summary") {
            let store = store.as_ref();
            seed(store);
            for (date, status) in [
                ("2024-01-10", AttendanceStatus::Present),
                ("2024-01-11", AttendanceStatus::Present),
                ("2024-01-12", AttendanceStatus::Absent),
                ("2024-01-13", AttendanceStatus::Present),
            ] {
                mark(store, "Maths", date, status, "F1");
            }
            let s = student_attendance_summary(store, "S1").expect("summary");
            assert_eq!(s.subject_wise["Maths"].percentage, 75.0);
            assert_eq!(s.percentage, 75.0);
            summaries.push(
                s.attendance
                    .iter()
                    .map(|r| (r.subject_name.clone(), r.date, r.status))
                    .collect::<Vec<_>>(),
            );
        }
        assert_eq!(summaries[0], summaries[1]);
    }

    #[test]
    fn foreign_faculty_delete_is_a_silent_no_op() {
        for store in both_backends("portald-records-scoped") {
            let store = store.as_ref();
            seed(store);
            mark(store, "Maths", "2024-01-10", AttendanceStatus::Present, "F1");
            marks(store, "Maths", ExamType::Semester, 80, "F1");
            let att_id = store
                .list_attendance(&RecordFilter::default(), RecordOrder::Recent)
                .expect("list")[0]
                .id;
            let marks_id = student_marks(store, "S1").expect("marks")[0].id;

            let f2 = Actor::Faculty("F2".to_string());
            assert_eq!(delete_attendance(store, &f2, att_id).expect("delete"), 0);
            assert_eq!(delete_marks(store, &f2, marks_id).expect("delete"), 0);
            assert_eq!(attendance_records(store, &Actor::Admin).expect("list").len(), 1);
            assert_eq!(marks_records(store, &Actor::Admin).expect("list").len(), 1);
            assert!(attendance_records(store, &f2).expect("list").is_empty());

            let f1 = Actor::Faculty("F1".to_string());
            assert_eq!(delete_attendance(store, &f1, att_id).expect("delete"), 1);
            assert_eq!(delete_marks(store, &f1, marks_id).expect("delete"), 1);
            assert_eq!(delete_attendance(store, &f1, att_id).expect("delete again"), 0);
        }
    }

    #[test]
    fn clear_requires_admin() {
        for store in both_backends("portald-records-clear") {
            let store = store.as_ref();
            seed(store);
            mark(store, "Maths", "2024-01-10", AttendanceStatus::Present, "F1");
            mark(store, "Physics", "2024-01-10", AttendanceStatus::Absent, "F2");
            let f1 = Actor::Faculty("F1".to_string());
            assert!(matches!(
                clear_attendance(store, &f1),
                Err(RecordsError::Guard(GuardError::NotPermitted(Role::Faculty)))
            ));
            assert_eq!(clear_attendance(store, &Actor::Admin).expect("clear"), 2);
            assert_eq!(clear_marks(store, &Actor::Admin).expect("clear"), 0);
            assert_eq!(student_attendance_summary(store, "S1").expect("summary").percentage, 0.0);
        }
    }
}
