//! Web sessions established after a login token is redeemed.
//!
//! Opaque ids in a cookie, state held in memory: losing them on restart just
//! sends the user back through a fresh chat login link.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::Language;

pub const SESSION_COOKIE: &str = "fb_session";

#[derive(Debug, Clone)]
pub struct WebSession {
    pub user_id: String,
    pub name: Option<String>,
    pub language: Option<Language>,
}

struct Entry {
    session: WebSession,
    created: Instant,
}

pub struct WebSessionStore {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl WebSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Create a session and return its opaque id.
    pub fn create(&self, session: WebSession) -> String {
        let sid = uuid::Uuid::new_v4().to_string();
        self.entries.insert(
            sid.clone(),
            Entry {
                session,
                created: Instant::now(),
            },
        );
        sid
    }

    /// Look up a live session; expired ones are dropped on sight.
    pub fn get(&self, sid: &str) -> Option<WebSession> {
        if let Some(entry) = self.entries.get(sid) {
            if entry.created.elapsed() <= self.ttl {
                return Some(entry.session.clone());
            }
        }
        self.entries
            .remove_if(sid, |_, entry| entry.created.elapsed() > self.ttl);
        None
    }

    pub fn remove(&self, sid: &str) -> bool {
        self.entries.remove(sid).is_some()
    }

    #[cfg(test)]
    fn backdate(&self, sid: &str, age: Duration) {
        if let Some(mut entry) = self.entries.get_mut(sid) {
            entry.created = Instant::now() - age;
        }
    }
}

/// Extract the session cookie value from a Cookie header.
pub fn session_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WebSessionStore {
        WebSessionStore::new(Duration::from_secs(86_400))
    }

    fn session() -> WebSession {
        WebSession {
            user_id: "15551234".into(),
            name: Some("Alex".into()),
            language: Some(Language::En),
        }
    }

    #[test]
    fn test_create_get_remove() {
        let store = store();
        let sid = store.create(session());

        let found = store.get(&sid).unwrap();
        assert_eq!(found.user_id, "15551234");

        assert!(store.remove(&sid));
        assert!(store.get(&sid).is_none());
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = store();
        let sid = store.create(session());
        store.backdate(&sid, Duration::from_secs(90_000));
        assert!(store.get(&sid).is_none());
    }

    #[test]
    fn test_cookie_header_parsing() {
        assert_eq!(
            session_from_cookie_header("fb_session=abc123"),
            Some("abc123")
        );
        assert_eq!(
            session_from_cookie_header("theme=dark; fb_session=abc123; other=1"),
            Some("abc123")
        );
        assert_eq!(session_from_cookie_header("theme=dark"), None);
        assert_eq!(session_from_cookie_header(""), None);
    }
}
