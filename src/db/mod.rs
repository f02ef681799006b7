mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::model::{
    AttendanceKey, AttendanceRecord, AttendanceSubmission, Department, MarksRecord,
    MarksSubmission, Role, Subject, TimetableEntry, User,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub join_year: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TimetableFilter {
    pub department: Option<Department>,
    pub join_year: Option<String>,
    pub faculty_id: Option<String>,
}

/// Predicate shared by attendance and marks listing/deletion. Every `Some`
/// field must match; an all-`None` filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub id: Option<i64>,
    pub student_id: Option<String>,
    pub faculty_id: Option<String>,
}

impl RecordFilter {
    pub fn student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, id: i64, student_id: &str, faculty_id: &str) -> bool {
        self.id.map_or(true, |v| v == id)
            && self.student_id.as_deref().map_or(true, |v| v == student_id)
            && self.faculty_id.as_deref().map_or(true, |v| v == faculty_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// Attendance: (subject, date). Marks: (subject, exam type).
    BySubject,
    /// Newest date first, then subject.
    Recent,
}

/// Storage contract both backends satisfy with identical observable
/// semantics. Upserts are atomic per natural key; deletes return the number
/// of rows removed.
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> Backend;

    fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError>;
    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Returns the user and stored password digest when `id` has `role`.
    fn find_credentials(&self, id: &str, role: Role)
        -> Result<Option<(User, String)>, StoreError>;
    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError>;
    /// Deletes a non-admin user, cascading their attendance/marks and
    /// clearing their timetable assignments.
    fn delete_user(&self, id: &str) -> Result<usize, StoreError>;

    fn insert_subject(
        &self,
        department: Department,
        join_year: &str,
        subject_name: &str,
    ) -> Result<i64, StoreError>;
    fn list_subjects(
        &self,
        department: Department,
        join_year: &str,
    ) -> Result<Vec<Subject>, StoreError>;
    fn delete_subject(&self, id: i64) -> Result<usize, StoreError>;

    fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError>;
    fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError>;
    fn clear_timetable(&self) -> Result<usize, StoreError>;

    fn upsert_attendance(&self, submission: &AttendanceSubmission) -> Result<(), StoreError>;
    fn attendance_exists(&self, key: &AttendanceKey) -> Result<bool, StoreError>;
    fn list_attendance(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn delete_attendance(&self, filter: &RecordFilter) -> Result<usize, StoreError>;

    fn upsert_marks(&self, submission: &MarksSubmission) -> Result<(), StoreError>;
    fn list_marks(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<MarksRecord>, StoreError>;
    fn delete_marks(&self, filter: &RecordFilter) -> Result<usize, StoreError>;
}

/// Picks the backend once for the process lifetime: the SQLite file unless
/// `force_memory` is set or it cannot be opened.
pub fn open_store(db_path: &Path, force_memory: bool) -> Arc<dyn RecordStore> {
    if force_memory {
        info!("using in-memory storage (requested)");
        return Arc::new(MemoryStore::new());
    }
    match SqliteStore::open(db_path) {
        Ok(store) => {
            info!(path = %db_path.display(), "sqlite store opened");
            Arc::new(store)
        }
        Err(e) => {
            warn!(path = %db_path.display(), error = %e, "sqlite store unavailable, using in-memory storage");
            Arc::new(MemoryStore::new())
        }
    }
}
