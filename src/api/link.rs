//! The single backend connection that outbound events are delivered to.

use crate::session::Event;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

/// Exclusive access to the registry's event stream.
///
/// Events produced while no backend is attached stay queued and are
/// delivered in order to the next one.
#[derive(Clone)]
pub struct BackendLink {
    events: Arc<Mutex<mpsc::UnboundedReceiver<Event>>>,
}

pub type AttachedBackend = OwnedMutexGuard<mpsc::UnboundedReceiver<Event>>;

impl BackendLink {
    pub fn new(events: mpsc::UnboundedReceiver<Event>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
        }
    }

    /// Claim the event stream; `None` while another backend holds it.
    pub fn attach(&self) -> Option<AttachedBackend> {
        Arc::clone(&self.events).try_lock_owned().ok()
    }

    pub fn is_connected(&self) -> bool {
        self.events.try_lock().is_err()
    }
}
