use crate::db::RecordFilter;
use crate::model::Role;

/// Who is acting on attendance/marks. Faculty and student actors carry the
/// identity every predicate is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Faculty(String),
    Student(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("{0} id is required")]
    MissingIdentity(Role),
    #[error("{0} may not modify records")]
    NotPermitted(Role),
}

impl Actor {
    pub fn new(role: Role, id: Option<&str>) -> Result<Self, GuardError> {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        match role {
            Role::Admin => Ok(Actor::Admin),
            Role::Faculty => id
                .map(|s| Actor::Faculty(s.to_string()))
                .ok_or(GuardError::MissingIdentity(Role::Faculty)),
            Role::Student => id
                .map(|s| Actor::Student(s.to_string()))
                .ok_or(GuardError::MissingIdentity(Role::Student)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Admin => Role::Admin,
            Actor::Faculty(_) => Role::Faculty,
            Actor::Student(_) => Role::Student,
        }
    }

    /// Predicate for deleting one record by id. Faculty only ever match
    /// their own rows, so a foreign id deletes nothing.
    pub fn delete_scope(&self, record_id: i64) -> Result<RecordFilter, GuardError> {
        match self {
            Actor::Admin => Ok(RecordFilter {
                id: Some(record_id),
                ..RecordFilter::default()
            }),
            Actor::Faculty(faculty_id) => Ok(RecordFilter {
                id: Some(record_id),
                faculty_id: Some(faculty_id.clone()),
                ..RecordFilter::default()
            }),
            Actor::Student(_) => Err(GuardError::NotPermitted(Role::Student)),
        }
    }

    /// Predicate for wiping a whole table.
    pub fn clear_scope(&self) -> Result<RecordFilter, GuardError> {
        match self {
            Actor::Admin => Ok(RecordFilter::default()),
            Actor::Faculty(_) | Actor::Student(_) => Err(GuardError::NotPermitted(self.role())),
        }
    }

    /// Predicate for per-record listings ("my records" for faculty, own
    /// records for students, everything for admin).
    pub fn listing_scope(&self) -> RecordFilter {
        match self {
            Actor::Admin => RecordFilter::default(),
            Actor::Faculty(faculty_id) => RecordFilter {
                faculty_id: Some(faculty_id.clone()),
                ..RecordFilter::default()
            },
            Actor::Student(student_id) => RecordFilter::student(student_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faculty_delete_is_owner_scoped() {
        let actor = Actor::new(Role::Faculty, Some("F1")).expect("actor");
        let scope = actor.delete_scope(42).expect("scope");
        assert!(scope.matches(42, "S1", "F1"));
        assert!(!scope.matches(42, "S1", "F2"));
        assert!(!scope.matches(41, "S1", "F1"));
    }

    #[test]
    fn admin_delete_matches_any_owner() {
        let scope = Actor::Admin.delete_scope(7).expect("scope");
        assert!(scope.matches(7, "S1", "F1"));
        assert!(scope.matches(7, "S2", "F9"));
    }

    #[test]
    fn only_admin_clears() {
        assert_eq!(Actor::Admin.clear_scope(), Ok(RecordFilter::default()));
        let faculty = Actor::Faculty("F1".to_string());
        assert_eq!(
            faculty.clear_scope(),
            Err(GuardError::NotPermitted(Role::Faculty))
        );
        let student = Actor::Student("S1".to_string());
        assert!(student.delete_scope(1).is_err());
    }

    #[test]
    fn faculty_and_student_need_an_identity() {
        assert_eq!(
            Actor::new(Role::Faculty, Some("  ")),
            Err(GuardError::MissingIdentity(Role::Faculty))
        );
        assert_eq!(
            Actor::new(Role::Student, None),
            Err(GuardError::MissingIdentity(Role::Student))
        );
        assert_eq!(Actor::new(Role::Admin, None), Ok(Actor::Admin));
    }

    #[test]
    fn listings_follow_the_actor() {
        let f = Actor::Faculty("F1".to_string()).listing_scope();
        assert!(f.matches(1, "S1", "F1"));
        assert!(!f.matches(1, "S1", "F2"));
        let s = Actor::Student("S1".to_string()).listing_scope();
        assert!(s.matches(1, "S1", "F2"));
        assert!(!s.matches(1, "S2", "F2"));
        assert!(Actor::Admin.listing_scope().matches(3, "S9", "F9"));
    }
}
