//! Server-side session table.
//!
//! Handles issued to clients index into an arena of session slots.  Each
//! slot carries a generation that is bumped when its session closes, so a
//! handle that outlives its session is rejected with
//! [`StorError::InvalidHandle`] instead of silently aliasing a newer session
//! in the reused slot.  A second close of the same handle fails the same
//! way, which surfaces double-release bugs at the call site.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StorError;
use crate::types::{Handle, Instance};

/// State the server keeps for one open session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Instance the client presented when the session was opened, if any.
    pub instance: Option<Instance>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    session: Option<Session>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn check(&self, handle: Handle) -> Result<usize, StorError> {
        let index = handle.index() as usize;
        match self.slots.get(index) {
            Some(slot) if slot.generation == handle.generation() && slot.session.is_some() => {
                Ok(index)
            }
            _ => Err(StorError::InvalidHandle(handle.raw())),
        }
    }
}

/// Arena of open sessions, indexed by [`Handle`].
///
/// All methods take `&self`; the table is safe to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Mutex<Arena>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its handle.
    pub fn open(&self, session: Session) -> Handle {
        let mut arena = self.lock();
        if let Some(index) = arena.free.pop() {
            let slot = &mut arena.slots[index as usize];
            slot.session = Some(session);
            Handle::new(index, slot.generation)
        } else {
            let index = arena.slots.len() as u32;
            arena.slots.push(Slot {
                generation: 1,
                session: Some(session),
            });
            Handle::new(index, 1)
        }
    }

    /// Clone the session state behind a live handle.
    pub fn get(&self, handle: Handle) -> Result<Session, StorError> {
        let arena = self.lock();
        let index = arena.check(handle)?;
        Ok(arena.slots[index]
            .session
            .clone()
            .unwrap_or_default())
    }

    /// `true` when the handle refers to a live session.
    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().check(handle).is_ok()
    }

    /// Close a session, invalidating its handle.
    ///
    /// The slot generation is bumped before the slot is recycled, so the
    /// closed handle (and any stale copy of it) keeps failing even after the
    /// slot hosts a new session.
    pub fn close(&self, handle: Handle) -> Result<Session, StorError> {
        let mut arena = self.lock();
        let index = arena.check(handle)?;
        let slot = &mut arena.slots[index];
        let session = slot.session.take().unwrap_or_default();
        slot.generation = slot.generation.wrapping_add(1);
        arena.free.push(handle.index());
        Ok(session)
    }

    /// Remove and return every live session.
    ///
    /// Used by forced shutdown; each live entry is released exactly once and
    /// the table is empty afterwards.
    pub fn drain(&self) -> Vec<(Handle, Session)> {
        let mut arena = self.lock();
        let mut drained = Vec::new();
        for (index, slot) in arena.slots.iter_mut().enumerate() {
            if let Some(session) = slot.session.take() {
                drained.push((Handle::new(index as u32, slot.generation), session));
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        for (handle, _) in &drained {
            arena.free.push(handle.index());
        }
        drained
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.session.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_get_close() {
        let table = SessionTable::new();
        let handle = table.open(Session::default());
        assert!(table.contains(handle));
        assert!(table.get(handle).is_ok());

        table.close(handle).expect("close");
        assert!(!table.contains(handle));
        assert!(table.is_empty());
    }

    #[test]
    fn double_close_fails() {
        let table = SessionTable::new();
        let handle = table.open(Session::default());
        table.close(handle).expect("first close");

        let err = table.close(handle).expect_err("second close must fail");
        assert_eq!(err, StorError::InvalidHandle(handle.raw()));
    }

    #[test]
    fn stale_handle_rejected_after_slot_reuse() {
        let table = SessionTable::new();
        let first = table.open(Session::default());
        table.close(first).expect("close");

        // The slot is recycled with a new generation.
        let second = table.open(Session::default());
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());

        assert!(table.get(first).is_err());
        assert!(table.get(second).is_ok());
    }

    #[test]
    fn unknown_handle_rejected() {
        let table = SessionTable::new();
        let bogus = Handle::from(0xdead_beef_0000_0001);
        assert!(table.get(bogus).is_err());
        assert!(table.close(bogus).is_err());
    }

    #[test]
    fn drain_releases_each_session_once() {
        let table = SessionTable::new();
        let a = table.open(Session::default());
        let b = table.open(Session::default());
        let c = table.open(Session::default());
        table.close(b).expect("close");

        let drained = table.drain();
        let handles: Vec<_> = drained.iter().map(|(h, _)| *h).collect();
        assert_eq!(handles.len(), 2);
        assert!(handles.contains(&a));
        assert!(handles.contains(&c));
        assert!(table.is_empty());

        // everything drained is invalid now
        assert!(table.get(a).is_err());
        assert!(table.get(c).is_err());
        assert!(table.drain().is_empty());
    }

    #[test]
    fn instance_travels_with_session() {
        use crate::types::{Instance, InstanceId};

        let table = SessionTable::new();
        let handle = table.open(Session {
            instance: Some(Instance {
                instance_id: InstanceId::new("i-42"),
                name: "node".into(),
                provider_name: String::new(),
                region: String::new(),
            }),
        });
        let session = table.get(handle).expect("get");
        assert_eq!(
            session.instance.map(|i| i.instance_id.id).as_deref(),
            Some("i-42")
        );
    }
}
