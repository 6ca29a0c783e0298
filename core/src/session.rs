use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SessionError, SessionResult};
use crate::value::Value;

/// Session handle.
///
/// Cloning a `Session` yields another handle to the same record, so the copy a
/// provider keeps as its live entry sees every mutation made through the copy
/// handed to the application.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    data: RwLock<SessionData>,
}

/// The persisted part of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionData {
    expires_at: DateTime<Utc>,
    values: HashMap<String, Value>,
}

impl Session {
    /// Create a session expiring `max_age_seconds` from now.
    ///
    /// A zero or negative max-age yields a session that is already expired.
    pub fn new(id: impl Into<String>, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        let expires_at = chrono::Duration::try_seconds(max_age_seconds)
            .and_then(|age| now.checked_add_signed(age))
            .unwrap_or(if max_age_seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Self::with_expiry(id, expires_at)
    }

    /// Create a session with an explicit expiry time
    pub fn with_expiry(id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self::from_data(
            id.into(),
            SessionData {
                expires_at,
                values: HashMap::new(),
            },
        )
    }

    fn from_data(id: String, data: SessionData) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                data: RwLock::new(data),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Set a value, replacing any previous value under the same key
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write().values.insert(key.into(), value.into());
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().values.get(key).cloned()
    }

    /// Remove a value, returning it if it was present
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.write().values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().values.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().values.is_empty()
    }

    /// Snapshot of the whole value bag
    pub fn values(&self) -> HashMap<String, Value> {
        self.read().values.clone()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.read().expires_at
    }

    pub fn set_expires_at(&self, expires_at: DateTime<Utc>) {
        self.write().expires_at = expires_at;
    }

    /// A session is expired once `now >= expires_at`.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// Remaining lifetime, zero once expired.
    pub fn time_to_live(&self) -> Duration {
        (self.expires_at() - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Encode the expiry and value bag into bytes.
    ///
    /// Fails with [`SessionError::Encode`] if any value has no byte encoding.
    pub fn encode(&self) -> SessionResult<Vec<u8>> {
        let data = self.read();
        for (key, value) in &data.values {
            if let Some(reason) = value.unencodable() {
                return Err(SessionError::Encode {
                    id: self.id().to_string(),
                    reason: format!("value for key {:?} is a {}", key, reason),
                });
            }
        }
        serde_json::to_vec(&*data).map_err(|e| SessionError::Encode {
            id: self.id().to_string(),
            reason: e.to_string(),
        })
    }

    /// Rebuild a session from bytes produced by [`Session::encode`].
    pub fn decode(id: impl Into<String>, bytes: &[u8]) -> SessionResult<Self> {
        let id = id.into();
        match serde_json::from_slice::<SessionData>(bytes) {
            Ok(data) => Ok(Self::from_data(id, data)),
            Err(source) => Err(SessionError::Decode { id, source }),
        }
    }

    // A panic while holding the lock leaves the bag in whatever state the last
    // completed insert/remove produced, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.inner.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.inner.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("expires_at", &data.expires_at)
            .field("values", &data.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_session_data_operations() {
        let session = Session::new("dummy id", 0);
        assert_eq!(session.id(), "dummy id");
        assert!(session.is_empty());

        session.set("abc", "abc");
        assert_eq!(session.get("abc"), Some(Value::from("abc")));
        assert_eq!(session.get("def"), None);
        assert!(session.contains_key("abc"));
        assert_eq!(session.keys(), vec!["abc".to_string()]);

        session.set("abc", 42i64);
        assert_eq!(session.get("abc").and_then(|v| v.as_i64()), Some(42));
        assert_eq!(session.len(), 1);

        assert_eq!(session.delete("abc"), Some(Value::Int(42)));
        assert_eq!(session.delete("abc"), None);
        assert_eq!(session.get("abc"), None);
    }

    #[test]
    fn test_clones_share_values() {
        let session = Session::new("shared", 60);
        let live = session.clone();
        session.set("name", "John Doe");
        assert_eq!(live.get("name"), Some(Value::from("John Doe")));
    }

    #[test]
    fn test_session_expiry() {
        assert!(Session::new("zero", 0).is_expired());
        assert!(Session::new("negative", -1).is_expired());

        let session = Session::new("live", 60);
        assert!(!session.is_expired());
        assert!(session.time_to_live() > Duration::from_secs(58));

        session.set_expires_at(Utc::now() - ChronoDuration::seconds(1));
        assert!(session.is_expired());
        assert_eq!(session.time_to_live(), Duration::ZERO);
    }

    #[test]
    fn test_encode_decode() {
        let session = Session::new("dummy id", 0);
        session.set("abc", "abc");
        session.set("count", 3i64);
        session.set("ratio", 0.1f64);
        session.set("raw", vec![0u8, 255]);
        session.set(
            "nested",
            vec![Value::Null, Value::from(true), Value::from("x")],
        );

        let bytes = session.encode().unwrap();
        let decoded = Session::decode("dummy id", &bytes).unwrap();

        assert_eq!(decoded.id(), "dummy id");
        assert_eq!(decoded.expires_at(), session.expires_at());
        assert_eq!(decoded.values(), session.values());
    }

    #[test]
    fn test_encode_rejects_unencodable_values() {
        struct Secret;

        let session = Session::new("dummy id", 0);
        session.set("abc", "abc");
        session.set("struct", Value::opaque(Secret));

        let err = session.encode().unwrap_err();
        assert!(matches!(err, SessionError::Encode { .. }));
        assert!(err.to_string().contains("struct"));

        session.delete("struct");
        session.set("nan", f64::NAN);
        assert!(matches!(
            session.encode(),
            Err(SessionError::Encode { .. })
        ));

        session.delete("nan");
        assert!(session.encode().is_ok());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Session::decode("x", b""),
            Err(SessionError::Decode { .. })
        ));
        assert!(matches!(
            Session::decode("x", b"invalid"),
            Err(SessionError::Decode { .. })
        ));
        assert!(matches!(
            Session::decode("x", br#"{"values":{}}"#),
            Err(SessionError::Decode { .. })
        ));
    }
}
