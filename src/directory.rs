use crate::db::{RecordStore, StoreError, TimetableFilter, UserFilter};
use crate::model::{join_year_range, DayOfWeek, Department, InvalidValue, Role, TimeSlot, User};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_ADMIN_ID: &str = "admin";
const BULK_ERROR_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("User ID already exists")]
    UserExists,
    #[error(transparent)]
    Invalid(#[from] InvalidValue),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// `sha256$<salt>$<hex digest>`
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("sha256${}${}", salt, digest_hex(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(hex)) => digest_hex(salt, password) == hex,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub role: Role,
    pub id: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub class_name: Option<String>,
    pub roll_no: Option<String>,
    pub department: Option<Department>,
    pub start_year: Option<i32>,
}

impl NewUser {
    /// Cohort attributes only apply to students.
    fn into_user(self) -> Result<(User, String), InvalidValue> {
        let is_student = self.role == Role::Student;
        let join_year = match self.start_year.filter(|_| is_student) {
            Some(year) => Some(join_year_range(year)?),
            None => None,
        };
        let user = User {
            id: self.id,
            role: self.role,
            name: self.name,
            email: self.email,
            class_name: self.class_name.filter(|_| is_student),
            roll_no: self.roll_no.filter(|_| is_student),
            department: self.department.filter(|_| is_student),
            join_year,
        };
        Ok((user, self.password))
    }
}

pub fn create_user(store: &dyn RecordStore, new_user: NewUser) -> Result<User, DirectoryError> {
    if store.get_user(&new_user.id)?.is_some() {
        return Err(DirectoryError::UserExists);
    }
    let (user, password) = new_user.into_user()?;
    match store.insert_user(&user, &hash_password(&password)) {
        Ok(()) => {}
        Err(StoreError::DuplicateKey(_)) => return Err(DirectoryError::UserExists),
        Err(e) => return Err(e.into()),
    }
    info!(id = %user.id, role = %user.role, "user created");
    Ok(user)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Creates students one at a time and keeps going past failures. Entries
/// that failed to parse arrive as `Err((id, message))`.
pub fn bulk_create_students<I>(store: &dyn RecordStore, entries: I) -> BulkOutcome
where
    I: IntoIterator<Item = Result<NewUser, (String, String)>>,
{
    let mut outcome = BulkOutcome::default();
    let mut errors: Vec<String> = Vec::new();
    for entry in entries {
        let result = entry.map_err(|(id, msg)| format!("{}: {}", id, msg)).and_then(|u| {
            let id = u.id.clone();
            create_user(store, NewUser { role: Role::Student, ..u })
                .map_err(|e| format!("{}: {}", id, bulk_message(&e)))
        });
        match result {
            Ok(_) => outcome.created += 1,
            Err(msg) => {
                outcome.failed += 1;
                errors.push(msg);
            }
        }
    }
    if outcome.failed > 0 {
        warn!(created = outcome.created, failed = outcome.failed, "bulk student upload had failures");
    }
    errors.truncate(BULK_ERROR_LIMIT);
    outcome.errors = errors;
    outcome
}

fn bulk_message(e: &DirectoryError) -> String {
    match e {
        DirectoryError::UserExists => "User already exists".to_string(),
        DirectoryError::Invalid(inner) => inner.to_string(),
        DirectoryError::Store(inner) => inner.to_string(),
    }
}

/// Returns the user when `password` matches the stored digest for `id` in `role`.
pub fn authenticate(
    store: &dyn RecordStore,
    id: &str,
    password: &str,
    role: Role,
) -> Result<Option<User>, StoreError> {
    Ok(store
        .find_credentials(id, role)?
        .filter(|(_, stored)| verify_password(password, stored))
        .map(|(user, _)| user))
}

/// Creates the default administrator on a fresh store. Returns whether one was created.
pub fn seed_admin(store: &dyn RecordStore, password: &str) -> Result<bool, StoreError> {
    if store.get_user(DEFAULT_ADMIN_ID)?.is_some() {
        return Ok(false);
    }
    let admin = User {
        id: DEFAULT_ADMIN_ID.to_string(),
        role: Role::Admin,
        name: "Administrator".to_string(),
        email: "admin@sbk.edu".to_string(),
        class_name: None,
        roll_no: None,
        department: None,
        join_year: None,
    };
    store.insert_user(&admin, &hash_password(password))?;
    info!("default admin user created");
    Ok(true)
}

/// Distinct join-year ranges of students in a department, ascending.
pub fn cohort_years(store: &dyn RecordStore, department: Department) -> Result<Vec<String>, StoreError> {
    let students = store.list_users(&UserFilter {
        role: Some(Role::Student),
        department: Some(department),
        join_year: None,
    })?;
    let years: BTreeSet<String> = students.into_iter().filter_map(|u| u.join_year).collect();
    Ok(years.into_iter().collect())
}

pub fn cohort_students(
    store: &dyn RecordStore,
    department: Department,
    join_year: &str,
) -> Result<Vec<User>, StoreError> {
    store.list_users(&UserFilter {
        role: Some(Role::Student),
        department: Some(department),
        join_year: Some(join_year.to_string()),
    })
}

/// Name lookup for joining record listings with student names.
pub fn user_names(store: &dyn RecordStore, role: Role) -> Result<HashMap<String, String>, StoreError> {
    Ok(store
        .list_users(&UserFilter {
            role: Some(role),
            ..UserFilter::default()
        })?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSubject {
    pub department: Department,
    pub join_year: String,
    pub subject_name: String,
}

/// Distinct cohort subjects a faculty member teaches according to the timetable.
pub fn assigned_subjects(store: &dyn RecordStore, faculty_id: &str) -> Result<Vec<AssignedSubject>, StoreError> {
    let entries = store.list_timetable(&TimetableFilter {
        faculty_id: Some(faculty_id.to_string()),
        ..TimetableFilter::default()
    })?;
    let distinct: BTreeSet<AssignedSubject> = entries
        .into_iter()
        .map(|e| AssignedSubject {
            department: e.department,
            join_year: e.join_year,
            subject_name: e.subject_name,
        })
        .collect();
    Ok(distinct.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub day_of_week: DayOfWeek,
    pub time_slot: TimeSlot,
    pub subject_name: String,
    pub faculty_name: Option<String>,
    pub faculty_id: Option<String>,
}

/// The weekly grid for a student's cohort, Monday first, earliest slot first.
/// Unknown ids and non-students get an empty week.
pub fn student_timetable(store: &dyn RecordStore, student_id: &str) -> Result<Vec<TimetableSlot>, StoreError> {
    let Some(student) = store.get_user(student_id)?.filter(|u| u.role == Role::Student) else {
        return Ok(Vec::new());
    };
    let (Some(department), Some(join_year)) = (student.department, student.join_year) else {
        return Ok(Vec::new());
    };
    let mut entries = store.list_timetable(&TimetableFilter {
        department: Some(department),
        join_year: Some(join_year),
        faculty_id: None,
    })?;
    entries.sort_by_key(|e| (e.day_of_week, e.time_slot));

    let faculty = user_names(store, Role::Faculty)?;
    Ok(entries
        .into_iter()
        .map(|e| TimetableSlot {
            day_of_week: e.day_of_week,
            time_slot: e.time_slot,
            subject_name: e.subject_name,
            faculty_name: e.faculty_id.as_ref().and_then(|id| faculty.get(id).cloned()),
            faculty_id: e.faculty_id,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::both_backends;
    use crate::model::TimetableEntry;

    fn student_entry(id: &str, department: Department, start_year: i32) -> NewUser {
        NewUser {
            role: Role::Student,
            id: id.to_string(),
            password: "pw".to_string(),
            name: format!("Student {}", id),
            email: format!("{}@sbk.edu", id),
            class_name: Some("II-A".to_string()),
            roll_no: Some(id.to_string()),
            department: Some(department),
            start_year: Some(start_year),
        }
    }

    #[test]
    fn password_digest_round_trips_and_is_salted() {
        let a = hash_password("admin123");
        let b = hash_password("admin123");
        assert_ne!(a, b);
        assert!(verify_password("admin123", &a));
        assert!(!verify_password("admin124", &a));
        assert!(!verify_password("admin123", "admin123"));
    }

    #[test]
    fn seeding_is_idempotent() {
        for store in both_backends("portald-dir-seed") {
            let store = store.as_ref();
            assert!(seed_admin(store, "admin123").expect("seed"));
            assert!(!seed_admin(store, "other").expect("seed again"));
            assert!(authenticate(store, "admin", "admin123", Role::Admin)
                .expect("auth")
                .is_some());
            assert!(authenticate(store, "admin", "admin123", Role::Faculty)
                .expect("auth")
                .is_none());
        }
    }

    #[test]
    fn students_get_a_derived_join_year_and_faculty_do_not() {
        for store in both_backends("portald-dir-create") {
            let store = store.as_ref();
            let s = create_user(store, student_entry("S1", Department::Bca, 2024)).expect("create");
            assert_eq!(s.join_year.as_deref(), Some("2024-2027"));
            let f = create_user(
                store,
                NewUser {
                    role: Role::Faculty,
                    ..student_entry("F1", Department::Bca, 2024)
                },
            )
            .expect("create faculty");
            assert_eq!(f.join_year, None);
            assert_eq!(f.department, None);
            assert!(matches!(
                create_user(store, student_entry("S1", Department::Maths, 2023)),
                Err(DirectoryError::UserExists)
            ));
        }
    }

    #[test]
    fn start_year_without_a_cohort_range_is_rejected() {
        for store in both_backends("portald-dir-year") {
            let store = store.as_ref();
            match create_user(store, student_entry("S9", Department::Bca, i32::MAX)) {
                Err(DirectoryError::Invalid(e)) => assert_eq!(e.field, "startYear"),
                other => panic!("unexpected result: {other:?}"),
            }
            assert!(store.get_user("S9").expect("get").is_none());
        }
    }

    #[test]
    fn bulk_upload_continues_past_failures() {
        for store in both_backends("portald-dir-bulk") {
            let store = store.as_ref();
            let entries = vec![
                Ok(student_entry("S1", Department::Bca, 2024)),
                Ok(student_entry("S1", Department::Bca, 2024)),
                Err(("S9".to_string(), "invalid department: \"ART\"".to_string())),
                Ok(student_entry("S8", Department::Bca, i32::MAX)),
                Ok(student_entry("S2", Department::Bca, 2025)),
            ];
            let outcome = bulk_create_students(store, entries);
            assert_eq!(outcome.created, 2);
            assert_eq!(outcome.failed, 3);
            assert_eq!(outcome.errors[0], "S1: User already exists");
            assert!(outcome.errors[1].starts_with("S9: "));
            assert_eq!(outcome.errors[2], "S8: invalid startYear: \"2147483647\"");
            assert_eq!(
                cohort_years(store, Department::Bca).expect("years"),
                vec!["2024-2027".to_string(), "2025-2028".to_string()]
            );
        }
    }

    #[test]
    fn bulk_errors_are_capped() {
        let store = crate::db::MemoryStore::new();
        let entries = (0..15).map(|i| Err((format!("X{}", i), "bad".to_string())));
        let outcome = bulk_create_students(&store, entries);
        assert_eq!(outcome.failed, 15);
        assert_eq!(outcome.errors.len(), 10);
    }

    #[test]
    fn timetable_is_ordered_and_named() {
        for store in both_backends("portald-dir-timetable") {
            let store = store.as_ref();
            create_user(store, student_entry("S1", Department::Maths, 2024)).expect("student");
            create_user(
                store,
                NewUser {
                    role: Role::Faculty,
                    name: "Dr. Rao".to_string(),
                    ..student_entry("F1", Department::Maths, 2024)
                },
            )
            .expect("faculty");
            let slot = |day: DayOfWeek, time: TimeSlot, subject: &str, faculty: Option<&str>| TimetableEntry {
                department: Department::Maths,
                join_year: "2024-2027".to_string(),
                day_of_week: day,
                time_slot: time,
                subject_name: subject.to_string(),
                faculty_id: faculty.map(str::to_string),
            };
            store
                .upsert_timetable(&slot(DayOfWeek::Tuesday, TimeSlot::Nine, "Algebra", Some("F1")))
                .expect("slot");
            store
                .upsert_timetable(&slot(DayOfWeek::Monday, TimeSlot::Two, "Calculus", None))
                .expect("slot");
            store
                .upsert_timetable(&slot(DayOfWeek::Monday, TimeSlot::Twelve, "Algebra", Some("F1")))
                .expect("slot");
            // Same slot key again replaces the subject.
            store
                .upsert_timetable(&slot(DayOfWeek::Monday, TimeSlot::Two, "Statistics", Some("F1")))
                .expect("slot");

            let week = student_timetable(store, "S1").expect("timetable");
            let summary: Vec<(&str, &str, &str)> = week
                .iter()
                .map(|s| (s.day_of_week.as_str(), s.time_slot.as_str(), s.subject_name.as_str()))
                .collect();
            assert_eq!(
                summary,
                vec![
                    ("Monday", "12-1", "Algebra"),
                    ("Monday", "2-3", "Statistics"),
                    ("Tuesday", "9-10", "Algebra"),
                ]
            );
            assert_eq!(week[0].faculty_name.as_deref(), Some("Dr. Rao"));

            let assigned = assigned_subjects(store, "F1").expect("assigned");
            assert_eq!(
                assigned
                    .iter()
                    .map(|a| a.subject_name.as_str())
                    .collect::<Vec<_>>(),
                vec!["Algebra", "Statistics"]
            );
            assert!(student_timetable(store, "F1").expect("faculty").is_empty());
            assert!(student_timetable(store, "nobody").expect("missing").is_empty());
        }
    }
}
