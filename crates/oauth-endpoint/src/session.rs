//! Token-keyed storage for suspended authorization requests.
//!
//! A stateless redirect chain cannot carry the original authorization
//! request itself, so it carries an opaque token instead; the request waits
//! here until the browser comes back from the login or consent page.
//! Entries expire so a stale attempt cannot be resumed indefinitely.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Length of a generated session token.
const TOKEN_LEN: usize = 32;

/// Opaque, unguessable key identifying one suspended authorization flow.
///
/// The token is the sole store key; whoever holds it can resume the flow,
/// so it must never be logged in full or reused across flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token for a new authorization attempt.
    pub fn generate() -> Self {
        Self(generate_random_string(TOKEN_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One suspended authorization attempt. Immutable once stored: the redirect
/// builders only ever read it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// The original, fully-encoded query string of the authorization
    /// request; re-emitted verbatim (after escaping) on every later
    /// redirect so downstream pages see the original request.
    pub query_string: String,
    /// Tenant the request belongs to.
    pub tenant_id: String,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: SessionEntry,
    expires_at: DateTime<Utc>,
}

/// Keyed store mapping a session token to an in-flight authorization
/// request.
pub trait SessionStore: Send + Sync {
    /// Store an entry under a token. Tokens are unique per flow, so a
    /// duplicate put is last-write-wins.
    fn put(&self, token: SessionToken, entry: SessionEntry);

    /// Look up an entry. `None` covers absent, expired and never-issued
    /// tokens alike; callers must treat it as a fatal flow error.
    fn get(&self, token: &SessionToken) -> Option<SessionEntry>;

    /// Drop expired entries. Returns how many were removed.
    fn evict_expired(&self) -> usize;
}

/// In-memory store with time-based eviction.
///
/// An expired entry is unreachable through [`SessionStore::get`] even
/// before the eviction task runs.
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionToken, StoredEntry>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(&self, token: SessionToken, entry: SessionEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            token,
            StoredEntry {
                entry,
                expires_at: Utc::now() + self.ttl,
            },
        );
    }

    fn get(&self, token: &SessionToken) -> Option<SessionEntry> {
        let entries = self.entries.read().unwrap();
        entries.get(token).and_then(|stored| {
            if stored.expires_at > Utc::now() {
                Some(stored.entry.clone())
            } else {
                None
            }
        })
    }

    fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        before - entries.len()
    }
}

/// Generate a cryptographically secure random string.
pub fn generate_random_string(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
