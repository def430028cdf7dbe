use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::domain::models::{PageSnapshot, SessionResult};
use crate::services::{Session, UpdateSummary};

/// Shared access to one [`Session`].
///
/// Mutations go through a `tokio::sync::Mutex`, so at most one update runs
/// at a time. Every mutation publishes the new result on a watch channel
/// while still holding the lock, which keeps published results in update
/// order. Reads never touch the lock.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    session: Arc<Mutex<Session>>,
    published: Arc<watch::Sender<SessionResult>>,
    latest: watch::Receiver<SessionResult>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        let (published, latest) = watch::channel(session.compute());
        Self {
            id: session.id(),
            session: Arc::new(Mutex::new(session)),
            published: Arc::new(published),
            latest,
        }
    }

    pub const fn session_id(&self) -> Uuid {
        self.id
    }

    pub async fn update(&self, snapshot: &PageSnapshot) -> UpdateSummary {
        let mut session = self.session.lock().await;
        let summary = session.update(snapshot);
        self.published.send_replace(session.compute());
        summary
    }

    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        session.reset();
        self.published.send_replace(session.compute());
    }

    /// Latest published result. Never blocks.
    pub fn compute(&self) -> SessionResult {
        self.latest.borrow().clone()
    }

    /// Receiver that observes every published result.
    pub fn subscribe(&self) -> watch::Receiver<SessionResult> {
        self.published.subscribe()
    }
}
