use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {value:?}")]
pub struct InvalidValue {
    pub field: &'static str,
    pub value: String,
}

impl InvalidValue {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Declares a closed string enum whose wire spelling is fixed. Declaration
/// order is the sort order.
macro_rules! wire_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = InvalidValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(InvalidValue::new($field, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(Role, "role", {
    Admin => "admin",
    Faculty => "faculty",
    Student => "student",
});

wire_enum!(Department, "department", {
    Tamil => "TAMIL",
    English => "ENGLISH",
    Maths => "MATHS",
    ComputerScience => "COMPUTER SCIENCE",
    InformationTechnology => "INFORMATION TECHNOLOGY",
    Bca => "BCA",
    Chemistry => "CHEMISTRY",
    PhysicalEducation => "PHYSICAL EDUCATION",
    History => "HISTORY",
    Bcom => "BCOM",
    BecomCa => "BECOM CA",
});

wire_enum!(AttendanceStatus, "status", {
    Present => "present",
    Absent => "absent",
});

wire_enum!(ExamType, "examType", {
    Internal1 => "internal1",
    Internal2 => "internal2",
    Semester => "semester",
});

wire_enum!(DayOfWeek, "dayOfWeek", {
    Monday => "Monday",
    Tuesday => "Tuesday",
    Wednesday => "Wednesday",
    Thursday => "Thursday",
    Friday => "Friday",
    Saturday => "Saturday",
});

wire_enum!(TimeSlot, "timeSlot", {
    Nine => "9-10",
    Ten => "10-11",
    Eleven => "11-12",
    Twelve => "12-1",
    Two => "2-3",
    Three => "3-4",
    Four => "4-5",
});

/// Cohort label for a student who started in `start_year`: `2024` -> `2024-2027`.
pub fn join_year_range(start_year: i32) -> Result<String, InvalidValue> {
    let end = start_year
        .checked_add(3)
        .ok_or_else(|| InvalidValue::new("startYear", &start_year.to_string()))?;
    Ok(format!("{}-{}", start_year, end))
}

/// Accepts `YYYY-MM-DD`, or an ISO timestamp whose date part is used.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, InvalidValue> {
    let t = raw.trim();
    let head = match t.split_once('T') {
        Some((d, _)) => d,
        None => t,
    };
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| InvalidValue::new("date", t))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub class_name: Option<String>,
    pub roll_no: Option<String>,
    pub department: Option<Department>,
    pub join_year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub department: Department,
    pub join_year: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub department: Department,
    pub join_year: String,
    pub day_of_week: DayOfWeek,
    pub time_slot: TimeSlot,
    pub subject_name: String,
    pub faculty_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    pub subject_name: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub faculty_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksRecord {
    pub id: i64,
    pub student_id: String,
    pub subject_name: String,
    pub exam_type: ExamType,
    pub marks: i64,
    pub faculty_id: String,
    pub date: DateTime<Utc>,
}

/// Natural key of an attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub student_id: String,
    pub subject_name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSubmission {
    pub key: AttendanceKey,
    pub status: AttendanceStatus,
    pub faculty_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarksSubmission {
    pub student_id: String,
    pub subject_name: String,
    pub exam_type: ExamType,
    pub marks: i64,
    pub faculty_id: String,
}
