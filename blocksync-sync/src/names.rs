use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Display name used when an author cannot be resolved.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Read-through cache from user id to display name, scoped to one session.
///
/// Failed lookups are cached as [`UNKNOWN_AUTHOR`] so each id costs at most
/// one remote call. The lock is not held across the remote call.
#[derive(Debug, Default)]
pub struct NameCache {
    names: Mutex<HashMap<String, String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<T: Transport + ?Sized>(&self, transport: &T, user_id: &str) -> String {
        if let Some(name) = self.lock().get(user_id) {
            return name.clone();
        }

        let name = match transport.resolve_display_name(user_id) {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => UNKNOWN_AUTHOR.to_string(),
            Err(err) => {
                warn!(user_id, error = %err, "could not resolve author name");
                UNKNOWN_AUTHOR.to_string()
            }
        };
        debug!(user_id, name = %name, "cached author name");
        self.lock()
            .entry(user_id.to_string())
            .or_insert(name)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CallKind, MemoryTransport};

    #[test]
    fn test_resolves_once_per_id() {
        let transport = MemoryTransport::new();
        transport.add_user("u1", "Ada");
        let cache = NameCache::new();

        assert_eq!(cache.resolve(&transport, "u1"), "Ada");
        assert_eq!(cache.resolve(&transport, "u1"), "Ada");
        assert_eq!(transport.count(CallKind::ResolveDisplayName), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_cached_as_unknown() {
        let transport = MemoryTransport::new();
        let cache = NameCache::new();

        assert_eq!(cache.resolve(&transport, "ghost"), UNKNOWN_AUTHOR);
        transport.add_user("ghost", "Late");
        assert_eq!(cache.resolve(&transport, "ghost"), UNKNOWN_AUTHOR);
        assert_eq!(transport.count(CallKind::ResolveDisplayName), 1);
    }

    #[test]
    fn test_blank_name_is_unknown() {
        let transport = MemoryTransport::new();
        transport.add_user("u2", "  ");
        assert_eq!(NameCache::new().resolve(&transport, "u2"), UNKNOWN_AUTHOR);
    }
}
