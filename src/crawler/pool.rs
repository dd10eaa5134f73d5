//! Session pool
//!
//! A fixed set of logged-in sessions, each fanned out into a fixed number
//! of page slots. Slots move through a bounded channel: acquiring takes the
//! next free slot or waits, releasing puts it back. A slot is owned by
//! exactly one task between acquire and release.

use crate::config::Config;
use crate::source::{Session, SessionSlot};
use crate::{HarvestError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Bounded pool of session slots
pub struct SessionPool {
    sessions: Vec<Arc<Session>>,
    slots_tx: mpsc::Sender<SessionSlot>,
    slots_rx: Mutex<mpsc::Receiver<SessionSlot>>,
    closed: AtomicBool,
    capacity: usize,
}

impl SessionPool {
    /// Launches every session up front and fills the pool with idle slots
    pub fn initialize(config: &Config) -> Result<Self> {
        let pool_size = config.harvester.pool_size as usize;
        let pages_per_session = config.harvester.pages_per_session as usize;
        let capacity = pool_size * pages_per_session;

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(Arc::new(Session::launch(
                &config.source.base_url,
                &config.user_agent.agent,
            )?));
        }

        let (slots_tx, slots_rx) = mpsc::channel(capacity);
        for session in &sessions {
            for _ in 0..pages_per_session {
                let slot = SessionSlot::new(Arc::clone(session));
                slots_tx
                    .try_send(slot)
                    .map_err(|_| HarvestError::PoolClosed)?;
            }
        }

        info!(
            sessions = pool_size,
            slots = capacity,
            "Session pool initialized"
        );

        Ok(Self {
            sessions,
            slots_tx,
            slots_rx: Mutex::new(slots_rx),
            closed: AtomicBool::new(false),
            capacity,
        })
    }

    /// Takes the next free slot, waiting if all are in use
    pub async fn acquire(&self) -> Result<SessionSlot> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HarvestError::PoolClosed);
        }

        let mut rx = self.slots_rx.lock().await;
        match rx.recv().await {
            Some(slot) => {
                debug!("Slot acquired");
                Ok(slot)
            }
            None => Err(HarvestError::PoolClosed),
        }
    }

    /// Returns a slot to the pool; after shutdown the slot is dropped
    pub fn release(&self, slot: SessionSlot) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        // Capacity matches the slot count, so this only fails at shutdown
        let _ = self.slots_tx.try_send(slot);
        debug!("Slot released");
    }

    /// Shuts the pool down: further acquires fail, sessions are closed
    pub async fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut rx = self.slots_rx.lock().await;
        rx.close();
        while rx.try_recv().is_ok() {}

        for session in &self.sessions {
            session.close();
        }
        info!(sessions = self.sessions.len(), "Session pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Total number of slots the pool was built with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The sessions backing the pool, for login at startup
    pub fn sessions(&self) -> &[Arc<Session>] {
        &self.sessions
    }
}
