use super::{SearchSession, SessionError, UserId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to one user's session.
///
/// The registry hands these out so a caller can keep working on a session after the map lock is
/// released. Requests for the same user must still be serialized by the caller; the inner lock
/// only makes the handle `Send + Sync` and is never held across an await point.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<SearchSession>>);

impl SessionHandle {
    fn new(session: SearchSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Run `f` against the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut SearchSession) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> SearchSession {
        self.with(|s| s.clone())
    }

    /// Whether both handles point at the same session.
    #[cfg(test)]
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Maps each user to at most one live [`SearchSession`].
///
/// Only the map is locked; lookups and mutations for different users never wait on each
/// other's session work.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UserId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh search for `user_id`, replacing any session it already has.
    pub fn create(&self, user_id: UserId, total_frames: u64) -> Result<SessionHandle, SessionError> {
        let handle = SessionHandle::new(SearchSession::new(user_id, total_frames)?);
        let replaced = self.sessions.write().insert(user_id, handle.clone()).is_some();
        tracing::info!(%user_id, total_frames, replaced, "created search session");
        Ok(handle)
    }

    /// The live session for `user_id`, if any.
    pub fn get(&self, user_id: UserId) -> Option<SessionHandle> {
        self.sessions.read().get(&user_id).cloned()
    }

    /// Drop the session for `user_id`. Returns whether one existed.
    pub fn end(&self, user_id: UserId) -> bool {
        let removed = self.sessions.write().remove(&user_id).is_some();
        if removed {
            tracing::info!(%user_id, "ended search session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_unknown_user_is_none() {
        let registry = SessionRegistry::new();
        assert!(registry.get(UserId(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn create_then_get_returns_same_session() {
        let registry = SessionRegistry::new();
        let created = registry.create(UserId(1), 100).unwrap();
        let fetched = registry.get(UserId(1)).unwrap();
        assert!(created.same_session(&fetched));
        assert_eq!(fetched.snapshot().total_frames(), 100);
    }

    #[test]
    fn create_replaces_existing_session() {
        let registry = SessionRegistry::new();
        let old = registry.create(UserId(7), 100).unwrap();
        old.with(|s| s.submit_answer(false)).unwrap();

        let new = registry.create(UserId(7), 10).unwrap();
        let current = registry.get(UserId(7)).unwrap();

        assert!(current.same_session(&new));
        assert!(!current.same_session(&old));
        let snapshot = current.snapshot();
        assert_eq!(snapshot.total_frames(), 10);
        assert_eq!(snapshot.steps_taken(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn create_with_zero_frames_leaves_registry_untouched() {
        let registry = SessionRegistry::new();
        registry.create(UserId(3), 5).unwrap();
        let err = registry.create(UserId(3), 0).unwrap_err();
        assert_eq!(err, SessionError::InvalidArgument { total_frames: 0 });
        assert_eq!(registry.get(UserId(3)).unwrap().snapshot().total_frames(), 5);
    }

    #[test]
    fn end_removes_and_tolerates_absent_users() {
        let registry = SessionRegistry::new();
        registry.create(UserId(1), 8).unwrap();
        assert!(registry.end(UserId(1)));
        assert!(registry.get(UserId(1)).is_none());
        assert!(!registry.end(UserId(1)));
        assert!(!registry.end(UserId(99)));
    }

    #[test]
    fn users_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.create(UserId(1), 8).unwrap();
        registry.create(UserId(2), 8).unwrap();
        a.with(|s| s.submit_answer(true)).unwrap();

        assert_eq!(registry.get(UserId(1)).unwrap().snapshot().bounds(), (0, 2));
        assert_eq!(registry.get(UserId(2)).unwrap().snapshot().bounds(), (0, 7));
    }

    #[test]
    fn panic_inside_a_session_leaves_it_usable() {
        let registry = Arc::new(SessionRegistry::new());
        let handle = registry.create(UserId(5), 8).unwrap();

        let worker = handle.clone();
        let joined = std::thread::spawn(move || {
            worker.with(|s| {
                s.submit_answer(false).unwrap();
                panic!("front end crashed mid-answer");
            })
        })
        .join();
        assert!(joined.is_err());

        let snapshot = registry.get(UserId(5)).unwrap().snapshot();
        assert_eq!(snapshot.bounds(), (4, 7));
        assert!(!handle.with(|s| s.submit_answer(true)).unwrap());
    }

    #[test]
    fn concurrent_users_do_not_interfere() {
        let registry = Arc::new(SessionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let user = UserId(i);
                    let launch_at = i as u64 * 100;
                    let handle = registry.create(user, 1_000).unwrap();
                    loop {
                        let finished = handle
                            .with(|s| {
                                let launched = s.current_probe() >= launch_at;
                                s.submit_answer(launched)
                            })
                            .unwrap();
                        if finished {
                            break;
                        }
                    }
                    let found = handle.snapshot().found_frame();
                    registry.end(user);
                    (found, launch_at)
                })
            })
            .collect();

        for t in threads {
            let (found, launch_at) = t.join().unwrap();
            assert_eq!(found, Some(launch_at));
        }
        assert!(registry.is_empty());
    }
}
