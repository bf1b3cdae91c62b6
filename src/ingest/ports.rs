//! Reservation of UDP ports for the RTP sinks.
//!
//! Each reservation asks the OS for an ephemeral port, then claims it in a
//! process-wide in-use set. A port stays exclusively owned by one session
//! until it is released.

use crate::session::SessionError;
use std::collections::HashSet;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PortPool {
    host: String,
    max_attempts: u32,
    in_use: Arc<Mutex<HashSet<u16>>>,
}

impl PortPool {
    pub fn new(host: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            host: host.into(),
            max_attempts: max_attempts.max(1),
            in_use: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Reserve a port the OS currently considers free and no session holds.
    pub fn reserve(&self) -> Result<u16, SessionError> {
        let host = self.host.clone();
        self.reserve_with(|| probe_ephemeral(&host))
    }

    /// Reservation loop with a pluggable probe; collisions retry up to the bound.
    pub fn reserve_with<F>(&self, mut probe: F) -> Result<u16, SessionError>
    where
        F: FnMut() -> std::io::Result<u16>,
    {
        for attempt in 1..=self.max_attempts {
            let port = probe()?;
            if self.lock().insert(port) {
                debug!("Reserved port {} (attempt {})", port, attempt);
                return Ok(port);
            }
            debug!("Port {} already reserved, retrying", port);
        }

        Err(SessionError::PortsExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Return a port to the pool. Releasing an unreserved port is a no-op.
    pub fn release(&self, port: u16) {
        if self.lock().remove(&port) {
            debug!("Released port {}", port);
        }
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    pub fn reserved_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u16>> {
        self.in_use.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bind an ephemeral UDP port, note its number, and let it go again.
fn probe_ephemeral(host: &str) -> std::io::Result<u16> {
    let socket = UdpSocket::bind((host, 0))?;
    Ok(socket.local_addr()?.port())
}
