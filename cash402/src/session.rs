//! Per-target session token cache.
//!
//! After a paid retry, the session token that came with the challenge is
//! remembered against the request target so later requests to the same
//! target can present it up front and skip another payment, as long as the
//! server still honours it.
//!
//! The key is the literal target string: no normalization and no path or
//! query decomposition. Entries never expire; a newer challenge for the same
//! target overwrites the old one. Each engine owns one cache, and concurrent
//! writers for the same target resolve as last-writer-wins.

use dashmap::DashMap;

use crate::proto::WireFormat;

/// A cached session credential and the encoding it must be presented in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// The opaque token issued with the challenge.
    pub token: String,
    /// The wire format of the challenge that issued it.
    pub format: WireFormat,
}

impl SessionToken {
    /// Creates a new session token.
    pub fn new(token: impl Into<String>, format: WireFormat) -> Self {
        Self {
            token: token.into(),
            format,
        }
    }

    /// Headers presenting this token on a request.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.format.session_headers(&self.token)
    }
}

/// Session tokens keyed by request target.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: DashMap<String, SessionToken>,
}

impl SessionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token cached for `target`, if any.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<SessionToken> {
        self.entries.get(target).map(|entry| entry.value().clone())
    }

    /// Stores `token` for `target`, returning the entry it replaced.
    pub fn insert(&self, target: impl Into<String>, token: SessionToken) -> Option<SessionToken> {
        let target = target.into();
        #[cfg(feature = "telemetry")]
        tracing::debug!(url = %target, format = %token.format, "Caching session token");
        self.entries.insert(target, token)
    }

    /// Drops the token cached for `target`.
    pub fn remove(&self, target: &str) -> Option<SessionToken> {
        self.entries.remove(target).map(|(_, token)| token)
    }

    /// Drops every cached token.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_literal_keys() {
        let cache = SessionCache::new();
        cache.insert(
            "http://localhost:3000/api",
            SessionToken::new("t1", WireFormat::Legacy),
        );
        assert!(cache.get("http://localhost:3000/api").is_some());
        assert!(cache.get("http://localhost:3000/api/").is_none());
        assert!(cache.get("http://localhost:3000/api?x=1").is_none());
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let cache = SessionCache::new();
        assert!(
            cache
                .insert("u", SessionToken::new("t1", WireFormat::Legacy))
                .is_none()
        );
        let previous = cache.insert("u", SessionToken::new("t2", WireFormat::Authenticate));
        assert_eq!(previous.map(|t| t.token), Some("t1".to_owned()));
        assert_eq!(
            cache.get("u"),
            Some(SessionToken::new("t2", WireFormat::Authenticate))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = SessionCache::new();
        cache.insert("a", SessionToken::new("t", WireFormat::Legacy));
        cache.insert("b", SessionToken::new("t", WireFormat::Legacy));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers_keep_one_entry() {
        let cache = Arc::new(SessionCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..100 {
                        cache.insert(
                            "http://shared/resource",
                            SessionToken::new(format!("t{i}-{j}"), WireFormat::Legacy),
                        );
                        cache.insert(
                            format!("http://own/{i}"),
                            SessionToken::new("own", WireFormat::Legacy),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 9);
        let shared = cache.get("http://shared/resource").unwrap();
        assert!(shared.token.ends_with("-99"));
    }

    #[test]
    fn test_token_headers_follow_format() {
        let token = SessionToken::new("tok", WireFormat::Authenticate);
        assert_eq!(
            token.headers(),
            vec![("Authorization", "x402 tok".to_owned())]
        );
    }
}
