//! Process-wide parse session lock.
//!
//! Independent [`scm_text::Parser`] values are safe to use concurrently,
//! but callers sharing one configuration workspace must serialize: acquire
//! the session before starting a parse and release it only after copying
//! every record they need into their own storage.

use std::sync::{Mutex, MutexGuard};

static SESSION: Mutex<()> = Mutex::new(());

/// Held while a parse session is in progress; dropping it releases the
/// session.
#[derive(Debug)]
pub struct Session(#[allow(dead_code)] MutexGuard<'static, ()>);

/// Block until the session is free and claim it. A poisoned lock is
/// reclaimed rather than propagated; the shared state it protects is
/// rebuilt from scratch by every parse.
pub fn acquire() -> Session {
    let guard = match SESSION.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    Session(guard)
}

/// Claim the session only if no other thread holds it.
pub fn try_acquire() -> Option<Session> {
    match SESSION.try_lock() {
        Ok(guard) => Some(Session(guard)),
        Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(Session(poisoned.into_inner())),
        Err(std::sync::TryLockError::WouldBlock) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_is_exclusive() {
        let held = acquire();
        assert!(try_acquire().is_none());
        drop(held);
        assert!(try_acquire().is_some());
    }
}
