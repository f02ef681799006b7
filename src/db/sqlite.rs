use super::{
    Backend, RecordFilter, RecordOrder, RecordStore, StoreError, TimetableFilter, UserFilter,
};
use crate::model::{
    AttendanceKey, AttendanceRecord, AttendanceSubmission, Department, InvalidValue, MarksRecord,
    MarksSubmission, Role, Subject, TimetableEntry, User,
};
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let conn =
            Connection::open(db_path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        init_schema(&conn).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'faculty', 'student')),
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            class_name TEXT,
            roll_no TEXT,
            department TEXT,
            join_year TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_cohort ON users(department, join_year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            department TEXT NOT NULL,
            join_year TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(department, join_year, subject_name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('present', 'absent')),
            faculty_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            UNIQUE(student_id, subject_name, date),
            FOREIGN KEY(student_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(faculty_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_faculty ON attendance(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            exam_type TEXT NOT NULL CHECK(exam_type IN ('internal1', 'internal2', 'semester')),
            marks INTEGER NOT NULL,
            faculty_id TEXT NOT NULL,
            date TEXT NOT NULL,
            UNIQUE(student_id, subject_name, exam_type),
            FOREIGN KEY(student_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(faculty_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_faculty ON marks(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            department TEXT NOT NULL,
            join_year TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            time_slot TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            faculty_id TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(department, join_year, day_of_week, time_slot),
            FOREIGN KEY(faculty_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_faculty ON timetable(faculty_id)",
        [],
    )?;

    Ok(())
}

/// Maps constraint failures onto the store taxonomy; everything else stays
/// a raw sqlite error.
fn classify(e: rusqlite::Error, what: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        match err.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::DuplicateKey(what.to_string());
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::MissingReference("user"),
            _ => {}
        }
    }
    StoreError::Sqlite(e)
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = InvalidValue>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = InvalidValue>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

const USER_COLUMNS: &str = "id, role, name, email, class_name, roll_no, department, join_year";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        role: parse_col(r, 1)?,
        name: r.get(2)?,
        email: r.get(3)?,
        class_name: r.get(4)?,
        roll_no: r.get(5)?,
        department: parse_opt_col(r, 6)?,
        join_year: r.get(7)?,
    })
}

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_name: r.get(2)?,
        date: r.get(3)?,
        status: parse_col(r, 4)?,
        faculty_id: r.get(5)?,
        timestamp: r.get(6)?,
    })
}

fn marks_from_row(r: &Row<'_>) -> rusqlite::Result<MarksRecord> {
    Ok(MarksRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_name: r.get(2)?,
        exam_type: parse_col(r, 3)?,
        marks: r.get(4)?,
        faculty_id: r.get(5)?,
        date: r.get(6)?,
    })
}

fn timetable_from_row(r: &Row<'_>) -> rusqlite::Result<TimetableEntry> {
    Ok(TimetableEntry {
        department: parse_col(r, 0)?,
        join_year: r.get(1)?,
        day_of_week: parse_col(r, 2)?,
        time_slot: parse_col(r, 3)?,
        subject_name: r.get(4)?,
        faculty_id: r.get(5)?,
    })
}

/// Builds ` WHERE a = ? AND b = ?` (or nothing) from optional equality terms.
fn where_clause(terms: Vec<(&'static str, Option<Value>)>) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    for (column, value) in terms {
        if let Some(v) = value {
            clauses.push(format!("{} = ?", column));
            params.push(v);
        }
    }
    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

fn record_where(filter: &RecordFilter) -> (String, Vec<Value>) {
    where_clause(vec![
        ("id", filter.id.map(Value::Integer)),
        ("student_id", filter.student_id.clone().map(Value::Text)),
        ("faculty_id", filter.faculty_id.clone().map(Value::Text)),
    ])
}

impl RecordStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users(id, password, role, name, email, class_name, roll_no, department, join_year, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &user.id,
                password_hash,
                user.role.as_str(),
                &user.name,
                &user.email,
                &user.class_name,
                &user.roll_no,
                user.department.map(|d| d.as_str()),
                &user.join_year,
                Utc::now(),
            ),
        )
        .map_err(|e| classify(e, "user"))?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
    }

    fn find_credentials(
        &self,
        id: &str,
        role: Role,
    ) -> Result<Option<(User, String)>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {}, password FROM users WHERE id = ? AND role = ?",
            USER_COLUMNS
        );
        Ok(conn
            .query_row(&sql, (id, role.as_str()), |r| {
                Ok((user_from_row(r)?, r.get::<_, String>(8)?))
            })
            .optional()?)
    }

    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = where_clause(vec![
            ("role", filter.role.map(|r| Value::Text(r.as_str().to_string()))),
            (
                "department",
                filter.department.map(|d| Value::Text(d.as_str().to_string())),
            ),
            ("join_year", filter.join_year.clone().map(Value::Text)),
        ]);
        let sql = format!("SELECT {} FROM users{} ORDER BY id", USER_COLUMNS, clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_user(&self, id: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        // attendance/marks cascade and timetable.faculty_id nulls via foreign keys.
        Ok(conn.execute("DELETE FROM users WHERE id = ? AND role != 'admin'", [id])?)
    }

    fn insert_subject(
        &self,
        department: Department,
        join_year: &str,
        subject_name: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO subjects(department, join_year, subject_name, created_at) VALUES(?, ?, ?, ?)",
            (department.as_str(), join_year, subject_name, Utc::now()),
        )
        .map_err(|e| classify(e, "subject"))?;
        Ok(conn.last_insert_rowid())
    }

    fn list_subjects(
        &self,
        department: Department,
        join_year: &str,
    ) -> Result<Vec<Subject>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, department, join_year, subject_name
             FROM subjects
             WHERE department = ? AND join_year = ?
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map((department.as_str(), join_year), |r| {
                Ok(Subject {
                    id: r.get(0)?,
                    department: parse_col(r, 1)?,
                    join_year: r.get(2)?,
                    subject_name: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_subject(&self, id: i64) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM subjects WHERE id = ?", [id])?)
    }

    fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO timetable(department, join_year, day_of_week, time_slot, subject_name, faculty_id, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(department, join_year, day_of_week, time_slot) DO UPDATE SET
               subject_name = excluded.subject_name,
               faculty_id = excluded.faculty_id",
            (
                entry.department.as_str(),
                &entry.join_year,
                entry.day_of_week.as_str(),
                entry.time_slot.as_str(),
                &entry.subject_name,
                &entry.faculty_id,
                Utc::now(),
            ),
        )
        .map_err(|e| classify(e, "timetable"))?;
        Ok(())
    }

    fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = where_clause(vec![
            (
                "department",
                filter.department.map(|d| Value::Text(d.as_str().to_string())),
            ),
            ("join_year", filter.join_year.clone().map(Value::Text)),
            ("faculty_id", filter.faculty_id.clone().map(Value::Text)),
        ]);
        let sql = format!(
            "SELECT department, join_year, day_of_week, time_slot, subject_name, faculty_id
             FROM timetable{} ORDER BY id",
            clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), timetable_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn clear_timetable(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM timetable", [])?)
    }

    fn upsert_attendance(&self, submission: &AttendanceSubmission) -> Result<(), StoreError> {
        let conn = self.lock()?;
        // Single statement: a concurrent duplicate lands on the UNIQUE key and
        // becomes a status update. Owner and timestamp stay with the first insert.
        conn.execute(
            "INSERT INTO attendance(student_id, subject_name, date, status, faculty_id, timestamp)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_name, date) DO UPDATE SET
               status = excluded.status",
            (
                &submission.key.student_id,
                &submission.key.subject_name,
                submission.key.date,
                submission.status.as_str(),
                &submission.faculty_id,
                Utc::now(),
            ),
        )
        .map_err(|e| classify(e, "attendance"))?;
        Ok(())
    }

    fn attendance_exists(&self, key: &AttendanceKey) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM attendance WHERE student_id = ? AND subject_name = ? AND date = ?",
                (&key.student_id, &key.subject_name, key.date),
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_attendance(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = record_where(filter);
        let order_by = match order {
            RecordOrder::BySubject => "subject_name, date, id",
            RecordOrder::Recent => "date DESC, subject_name, id",
        };
        let sql = format!(
            "SELECT id, student_id, subject_name, date, status, faculty_id, timestamp
             FROM attendance{} ORDER BY {}",
            clause, order_by
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), attendance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_attendance(&self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = record_where(filter);
        let sql = format!("DELETE FROM attendance{}", clause);
        Ok(conn.execute(&sql, params_from_iter(params))?)
    }

    fn upsert_marks(&self, submission: &MarksSubmission) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO marks(student_id, subject_name, exam_type, marks, faculty_id, date)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_name, exam_type) DO UPDATE SET
               marks = excluded.marks",
            (
                &submission.student_id,
                &submission.subject_name,
                submission.exam_type.as_str(),
                submission.marks,
                &submission.faculty_id,
                Utc::now(),
            ),
        )
        .map_err(|e| classify(e, "marks"))?;
        Ok(())
    }

    fn list_marks(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
    ) -> Result<Vec<MarksRecord>, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = record_where(filter);
        let order_by = match order {
            RecordOrder::BySubject => "subject_name, exam_type, id",
            RecordOrder::Recent => "date DESC, subject_name, id",
        };
        let sql = format!(
            "SELECT id, student_id, subject_name, exam_type, marks, faculty_id, date
             FROM marks{} ORDER BY {}",
            clause, order_by
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), marks_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_marks(&self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let (clause, params) = record_where(filter);
        let sql = format!("DELETE FROM marks{}", clause);
        Ok(conn.execute(&sql, params_from_iter(params))?)
    }
}
