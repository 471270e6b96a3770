//! Session registry: the set of logged-in users, keyed by session token.
//!
//! One tokio mutex guards the whole map. Every operation acquires it once and
//! holds it for its entire read-modify-write span, so username uniqueness is
//! checked and committed atomically and no caller ever observes a partial
//! update. The map and its lock are never exposed; operations hand out owned
//! `Session` clones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Online status of a session.
///
/// `Unset` exists only for sessions that have never had their status
/// recorded; on the wire it serializes as the nullable boolean the JSON API
/// has always used (`null` / `true` / `false` under the `online` key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Unset,
    Online,
    Offline,
}

impl Presence {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Presence::Unset => None,
            Presence::Online => Some(true),
            Presence::Offline => Some(false),
        }
    }

    /// A session counts as "seen" once its status has been set either way.
    pub fn is_set(self) -> bool {
        self != Presence::Unset
    }
}

impl From<Option<bool>> for Presence {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Presence::Unset,
            Some(true) => Presence::Online,
            Some(false) => Presence::Offline,
        }
    }
}

impl Serialize for Presence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_bool().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Presence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Presence::from(Option::<bool>::deserialize(deserializer)?))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A logged-in user.
///
/// The token doubles as the map key and the bearer credential; the username
/// is fixed at login. Wire field names (`online`, `lastSeen`) match the
/// original JSON API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub username: String,
    #[serde(rename = "online")]
    pub presence: Presence,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Shared handle to the session map. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user and issue a session token.
    ///
    /// The uniqueness scan and the insert happen under one lock acquisition,
    /// so two concurrent calls with the same username can never both succeed.
    /// Uniqueness is checked against every session, online or offline; a name
    /// frees up only when its session is removed via [`remove`].
    ///
    /// [`remove`]: SessionRegistry::remove
    pub async fn create(&self, username: &str) -> Result<Session, RegistryError> {
        if username.is_empty() {
            return Err(RegistryError::EmptyUsername);
        }

        let mut sessions = self.sessions.lock().await;

        if sessions.values().any(|s| s.username == username) {
            return Err(RegistryError::UsernameTaken(username.to_owned()));
        }

        let session = Session {
            token: Uuid::new_v4(),
            username: username.to_owned(),
            presence: Presence::Online,
            last_seen: Utc::now(),
        };
        sessions.insert(session.token, session.clone());

        debug!(token = %session.token, username = %session.username, "Session created");
        Ok(session)
    }

    /// O(1) membership check for a token.
    pub async fn token_exists(&self, token: Uuid) -> bool {
        self.sessions.lock().await.contains_key(&token)
    }

    /// Resolve the session behind a token.
    pub async fn get(&self, token: Uuid) -> Result<Session, RegistryError> {
        self.sessions
            .lock()
            .await
            .get(&token)
            .cloned()
            .ok_or(RegistryError::UnknownToken(token))
    }

    /// Find a session by username. Linear scan.
    pub async fn get_by_username(&self, username: &str) -> Result<Session, RegistryError> {
        self.sessions
            .lock()
            .await
            .values()
            .find(|s| s.username == username)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownUsername(username.to_owned()))
    }

    /// Record activity for a token. Returns `false` if the token is unknown.
    pub async fn touch(&self, token: Uuid) -> bool {
        match self.sessions.lock().await.get_mut(&token) {
            Some(session) => {
                session.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Set the presence flag for a token. Returns `false` if unknown.
    pub async fn set_presence(&self, token: Uuid, presence: Presence) -> bool {
        match self.sessions.lock().await.get_mut(&token) {
            Some(session) => {
                session.presence = presence;
                true
            }
            None => false,
        }
    }

    /// All sessions currently marked online. Order unspecified.
    pub async fn list_online(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| s.presence == Presence::Online)
            .cloned()
            .collect()
    }

    /// Every session, online or not. Order unspecified.
    pub async fn list_all(&self) -> Vec<Session> {
        self.sessions.lock().await.values().cloned().collect()
    }

    /// Delete a session outright (logout). The token is invalid afterwards
    /// and the username becomes available again.
    pub async fn remove(&self, token: Uuid) -> Result<Session, RegistryError> {
        let removed = self
            .sessions
            .lock()
            .await
            .remove(&token)
            .ok_or(RegistryError::UnknownToken(token))?;

        debug!(token = %token, username = %removed.username, "Session removed");
        Ok(removed)
    }

    /// One reaper sweep: mark every session idle for longer than `idle_after`
    /// as offline. The whole sweep is a single critical section so no
    /// session's status can change mid-sweep. Returns how many sessions were
    /// demoted from online.
    ///
    /// Sessions whose presence was never set are skipped, and records are
    /// never removed here; only the flag changes.
    pub async fn mark_idle_offline(&self, idle_after: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let now = Utc::now();
        let mut demoted = 0;

        for session in sessions.values_mut() {
            if !session.presence.is_set() {
                continue;
            }
            let idle = now
                .signed_duration_since(session.last_seen)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if idle > idle_after {
                if session.presence == Presence::Online {
                    demoted += 1;
                }
                session.presence = Presence::Offline;
            }
        }

        demoted
    }

    /// Shift a session's last-activity time into the past. `Utc::now()` is
    /// real wall-clock time even under tokio's paused test clock, so sweep
    /// tests set up idleness explicitly instead of sleeping.
    #[cfg(test)]
    pub(crate) async fn backdate_last_seen(&self, token: Uuid, by: Duration) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&token) {
            session.last_seen -= chrono::Duration::from_std(by).unwrap();
        }
    }
}
