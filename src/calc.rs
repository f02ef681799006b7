use crate::model::{AttendanceRecord, AttendanceStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Two-decimal rounding used for every attendance percentage.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `present / total` as a percentage; an empty set is 0, never NaN.
pub fn attendance_percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_2_decimals(present as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAttendance {
    pub total: usize,
    pub present: usize,
    pub percentage: f64,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub attendance: Vec<AttendanceRecord>,
    pub subject_wise: BTreeMap<String, SubjectAttendance>,
    pub total_classes: usize,
    pub present_classes: usize,
    pub percentage: f64,
}

impl AttendanceSummary {
    pub fn empty() -> Self {
        summarize_attendance(Vec::new())
    }
}

/// Groups a student's records by subject. The input is re-sorted by
/// (subject, date, id) first, so the result only depends on the set.
pub fn summarize_attendance<I>(records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = AttendanceRecord>,
{
    let mut records: Vec<AttendanceRecord> = records.into_iter().collect();
    records.sort_by(|a, b| (&a.subject_name, a.date, a.id).cmp(&(&b.subject_name, b.date, b.id)));

    let mut subject_wise: BTreeMap<String, SubjectAttendance> = BTreeMap::new();
    let mut present_classes: usize = 0;

    for r in &records {
        let entry = subject_wise
            .entry(r.subject_name.clone())
            .or_insert_with(|| SubjectAttendance {
                total: 0,
                present: 0,
                percentage: 0.0,
                records: Vec::new(),
            });
        entry.total += 1;
        if r.status == AttendanceStatus::Present {
            entry.present += 1;
            present_classes += 1;
        }
        entry.records.push(r.clone());
    }

    for s in subject_wise.values_mut() {
        s.percentage = attendance_percentage(s.present, s.total);
    }

    let total_classes = records.len();
    AttendanceSummary {
        attendance: records,
        subject_wise,
        total_classes,
        present_classes,
        percentage: attendance_percentage(present_classes, total_classes),
    }
}
