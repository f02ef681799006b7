use super::{
    Backend, RecordFilter, RecordOrder, RecordStore, StoreError, TimetableFilter, UserFilter,
};
use crate::model::{
    AttendanceKey, AttendanceRecord, AttendanceSubmission, Department, MarksRecord,
    MarksSubmission, Role, Subject, TimetableEntry, User,
};
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    /// Keyed by id; BTreeMap keeps listings in id order like the sqlite backend.
    users: BTreeMap<String, (User, String)>,
    subjects: Vec<Subject>,
    timetable: Vec<TimetableEntry>,
    attendance: Vec<AttendanceRecord>,
    marks: Vec<MarksRecord>,
    last_subject_id: i64,
    last_attendance_id: i64,
    last_marks_id: i64,
}

impl Tables {
    fn require_user(&self, id: &str) -> Result<(), StoreError> {
        if self.users.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::MissingReference("user"))
        }
    }
}

/// In-process mirror of the sqlite schema. One lock guards every table, so
/// each lookup-then-write runs as a single exclusive step.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if t.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey("user".to_string()));
        }
        t.users
            .insert(user.id.clone(), (user.clone(), password_hash.to_string()));
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let t = self.lock()?;
        Ok(t.users.get(id).map(|(u, _)| u.clone()))
    }

    fn find_credentials(
        &self,
        id: &str,
        role: Role,
    ) -> Result<Option<(User, String)>, StoreError> {
        let t = self.lock()?;
        Ok(t.users.get(id).filter(|(u, _)| u.role == role).cloned())
    }

    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let t = self.lock()?;
        Ok(t.users
            .values()
            .map(|(u, _)| u)
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.department.map_or(true, |d| u.department == Some(d)))
            .filter(|u| {
                filter
                    .join_year
                    .as_deref()
                    .map_or(true, |y| u.join_year.as_deref() == Some(y))
            })
            .cloned()
            .collect())
    }

    fn delete_user(&self, id: &str) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        match t.users.get(id) {
            Some((u, _)) if u.role != Role::Admin => {}
            _ => return Ok(0),
        }
        t.users.remove(id);
        // Same effect as the sqlite foreign keys.
        t.attendance
            .retain(|a| a.student_id != id && a.faculty_id != id);
        t.marks.retain(|m| m.student_id != id && m.faculty_id != id);
        for entry in t.timetable.iter_mut() {
            if entry.faculty_id.as_deref() == Some(id) {
                entry.faculty_id = None;
            }
        }
        Ok(1)
    }

    fn insert_subject(
        &self,
        department: Department,
        join_year: &str,
        subject_name: &str,
    ) -> Result<i64, StoreError> {
        let mut t = self.lock()?;
        let duplicate = t.subjects.iter().any(|s| {
            s.department == department && s.join_year == join_year && s.subject_name == subject_name
        });
        if duplicate {
            return Err(StoreError::DuplicateKey("subject".to_string()));
        }
        t.last_subject_id += 1;
        let id = t.last_subject_id;
        t.subjects.push(Subject {
            id,
            department,
            join_year: join_year.to_string(),
            subject_name: subject_name.to_string(),
        });
        Ok(id)
    }

    fn list_subjects(
        &self,
        department: Department,
        join_year: &str,
    ) -> Result<Vec<Subject>, StoreError> {
        let t = self.lock()?;
        Ok(t.subjects
            .iter()
            .filter(|s| s.department == department && s.join_year == join_year)
            .cloned()
            .collect())
    }

    fn delete_subject(&self, id: i64) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        let before = t.subjects.len();
        t.subjects.retain(|s| s.id != id);
        Ok(before - t.subjects.len())
    }

    fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if let Some(faculty_id) = entry.faculty_id.as_deref() {
            t.require_user(faculty_id)?;
        }
        let existing = t.timetable.iter_mut().find(|e| {
            e.department == entry.department
                && e.join_year == entry.join_year
                && e.day_of_week == entry.day_of_week
                && e.time_slot == entry.time_slot
        });
        match existing {
            Some(e) => {
                e.subject_name = entry.subject_name.clone();
                e.faculty_id = entry.faculty_id.clone();
            }
            None => t.timetable.push(entry.clone()),
        }
        Ok(())
    }

    fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError> {
        let t = self.lock()?;
        Ok(t.timetable
            .iter()
            .filter(|e| filter.department.map_or(true, |d| e.department == d))
            .filter(|e| {
                filter
                    .join_year
                    .as_deref()
                    .map_or(true, |y| e.join_year == y)
            })
            .filter(|e| {
                filter
                    .faculty_id
                    .as_deref()
                    .map_or(true, |f| e.faculty_id.as_deref() == Some(f))
            })
            .cloned()
            .collect())
    }

    fn clear_timetable(&self) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        let n = t.timetable.len();
        t.timetable.clear();
        Ok(n)
    }

    fn upsert_attendance(&self, submission: &AttendanceSubmission) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let key = &submission.key;
        if let Some(existing) = t.attendance.iter_mut().find(|a| {
            a.student_id == key.student_id && a.subject_name == key.subject_name && a.date == key.date
        }) {
            existing.status = submission.status;
            return Ok(());
        }
        t.require_user(&key.student_id)?;
        t.require_user(&submission.faculty_id)?;
        t.last_attendance_id += 1;
        let id = t.last_attendance_id;
        t.attendance.push(AttendanceRecord {
            id,
            student_id: key.student_id.clone(),
            subject_name: key.subject_name.clone(),
            date: key.date,
            status: submission.status,
            faculty_id: submission.faculty_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn attendance_exists(&self, key: &AttendanceKey) -> Result<bool, StoreError> {
        let t = self.lock()?;
        Ok(t.attendance.iter().any(|a| {
            a.student_id == key.student_id && a.subject_name == key.subject_name && a.date == key.date
        }))
    }

    fn list_attendance(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let t = self.lock()?;
        let mut rows: Vec<AttendanceRecord> = t
            .attendance
            .iter()
            .filter(|a| filter.matches(a.id, &a.student_id, &a.faculty_id))
            .cloned()
            .collect();
        match order {
            RecordOrder::BySubject => {
                rows.sort_by(|a, b| (&a.subject_name, a.date, a.id).cmp(&(&b.subject_name, b.date, b.id)))
            }
            RecordOrder::Recent => rows.sort_by(|a, b| {
                (Reverse(a.date), &a.subject_name, a.id).cmp(&(Reverse(b.date), &b.subject_name, b.id))
            }),
        }
        Ok(rows)
    }

    fn delete_attendance(&self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        let before = t.attendance.len();
        t.attendance
            .retain(|a| !filter.matches(a.id, &a.student_id, &a.faculty_id));
        Ok(before - t.attendance.len())
    }

    fn upsert_marks(&self, submission: &MarksSubmission) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if let Some(existing) = t.marks.iter_mut().find(|m| {
            m.student_id == submission.student_id
                && m.subject_name == submission.subject_name
                && m.exam_type == submission.exam_type
        }) {
            existing.marks = submission.marks;
            return Ok(());
        }
        t.require_user(&submission.student_id)?;
        t.require_user(&submission.faculty_id)?;
        t.last_marks_id += 1;
        let id = t.last_marks_id;
        t.marks.push(MarksRecord {
            id,
            student_id: submission.student_id.clone(),
            subject_name: submission.subject_name.clone(),
            exam_type: submission.exam_type,
            marks: submission.marks,
            faculty_id: submission.faculty_id.clone(),
            date: Utc::now(),
        });
        Ok(())
    }

    fn list_marks(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<MarksRecord>, StoreError> {
        let t = self.lock()?;
        let mut rows: Vec<MarksRecord> = t
            .marks
            .iter()
            .filter(|m| filter.matches(m.id, &m.student_id, &m.faculty_id))
            .cloned()
            .collect();
        match order {
            RecordOrder::BySubject => rows.sort_by(|a, b| {
                (&a.subject_name, a.exam_type, a.id).cmp(&(&b.subject_name, b.exam_type, b.id))
            }),
            RecordOrder::Recent => rows.sort_by(|a, b| {
                (Reverse(a.date), &a.subject_name, a.id).cmp(&(Reverse(b.date), &b.subject_name, b.id))
            }),
        }
        Ok(rows)
    }

    fn delete_marks(&self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        let before = t.marks.len();
        t.marks
            .retain(|m| !filter.matches(m.id, &m.student_id, &m.faculty_id));
        Ok(before - t.marks.len())
    }
}
