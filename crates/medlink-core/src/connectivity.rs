// ── Connectivity observation ──
//
// The platform's network observer is an external collaborator: it
// pushes `{is_connected, link}` transitions into a watch channel and
// the engine reacts. Nothing in this crate measures connectivity
// itself.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Physical link classification, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkType {
    Wifi,
    Cellular,
    Other,
}

/// A point-in-time connectivity report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub link: LinkType,
}

impl ConnectivityState {
    pub fn online_wifi() -> Self {
        Self {
            is_connected: true,
            link: LinkType::Wifi,
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            link: LinkType::Other,
        }
    }

    pub fn is_wifi(&self) -> bool {
        self.is_connected && self.link == LinkType::Wifi
    }
}

/// Read side of the connectivity feed, cheaply cloneable.
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityHandle {
    pub fn new(rx: watch::Receiver<ConnectivityState>) -> Self {
        Self { rx }
    }

    /// The latest reported state.
    pub fn current(&self) -> ConnectivityState {
        *self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_connected
    }

    /// A fresh receiver for `select!`-style loops.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.rx.clone()
    }
}

/// Create a connectivity feed. The embedder (or a test) holds the
/// sender and pushes transitions; the engine holds the handle.
pub fn channel(initial: ConnectivityState) -> (watch::Sender<ConnectivityState>, ConnectivityHandle) {
    let (tx, rx) = watch::channel(initial);
    (tx, ConnectivityHandle::new(rx))
}
