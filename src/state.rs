use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            started_at: Utc::now(),
        }
    }

    /// Creates a fresh idle session, sweeping abandoned ones first.
    pub fn create_session(&self) -> Uuid {
        let ttl = Duration::seconds(CONFIG.session_ttl_seconds as i64);
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.lock();
        sweep_expired(&mut sessions, Utc::now(), ttl);
        sessions.insert(id, Session::new());
        id
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

/// Drops sessions idle past the TTL. In-flight sessions are kept: their
/// outcome still has to land before the slot can be reclaimed.
fn sweep_expired(sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>, ttl: Duration) {
    sessions.retain(|_, session| session.is_analyzing() || now - session.last_activity() < ttl);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::media::ImagePayload;

    #[test]
    fn sweep_drops_only_sessions_idle_past_the_ttl() {
        let mut sessions = HashMap::new();
        sessions.insert(Uuid::new_v4(), Session::new());

        let ttl = Duration::seconds(60);
        let now = Utc::now();
        sweep_expired(&mut sessions, now, ttl);
        assert_eq!(sessions.len(), 1);

        sweep_expired(&mut sessions, now + Duration::seconds(120), ttl);
        assert!(sessions.is_empty());
    }

    #[test]
    fn sweep_keeps_analyzing_sessions_regardless_of_age() {
        let mut sessions = HashMap::new();
        let id = Uuid::new_v4();
        let mut session = Session::new();
        session
            .select_image(ImagePayload::new(vec![1, 2, 3], "image/png".to_string()))
            .unwrap();
        session.begin_analysis().unwrap();
        sessions.insert(id, session);

        sweep_expired(
            &mut sessions,
            Utc::now() + Duration::seconds(7200),
            Duration::seconds(60),
        );
        assert!(sessions.contains_key(&id));
    }
}
