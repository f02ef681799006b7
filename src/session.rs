use crate::model::{Role, User};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    pub expires_at: Instant,
}

impl Session {
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Longest lifetime a token can be given; larger TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Opaque bearer tokens issued at login. Tokens are identity hints for the
/// portal screens; they do not gate any operation.
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(MAX_TTL),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, user: &User) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let session = Session {
            user_id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            expires_at: now.checked_add(self.ttl).unwrap_or(now),
        };
        if let Ok(mut map) = self.sessions.lock() {
            map.retain(|_, s| s.expires_at > now);
            map.insert(token.clone(), session);
        }
        token
    }

    /// Live session for `token`; expired entries are dropped on lookup.
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut map = self.sessions.lock().ok()?;
        match map.get(token) {
            Some(s) if s.expires_at > Instant::now() => Some(s.clone()),
            Some(_) => {
                map.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .map(|mut map| map.remove(token).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> User {
        User {
            id: "admin".to_string(),
            role: Role::Admin,
            name: "Administrator".to_string(),
            email: "admin@sbk.edu".to_string(),
            class_name: None,
            roll_no: None,
            department: None,
            join_year: None,
        }
    }

    #[test]
    fn issued_token_resolves_until_removed() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(&admin());
        let session = store.get(&token).expect("live session");
        assert_eq!(session.user_id, "admin");
        assert_eq!(session.role, Role::Admin);
        assert!(session.remaining() <= Duration::from_secs(60));
        assert!(store.remove(&token));
        assert!(store.get(&token).is_none());
        assert!(!store.remove(&token));
    }

    #[test]
    fn zero_ttl_sessions_are_never_live() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create(&admin());
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let store = SessionStore::new(Duration::from_secs(u64::MAX));
        assert_eq!(store.ttl(), MAX_TTL);
        let token = store.create(&admin());
        let session = store.get(&token).expect("live session");
        assert!(session.remaining() > Duration::from_secs(60));
        assert!(session.remaining() <= MAX_TTL);
    }

    #[test]
    fn tokens_are_distinct() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert_ne!(store.create(&admin()), store.create(&admin()));
        assert!(store.get("not-a-token").is_none());
    }
}
