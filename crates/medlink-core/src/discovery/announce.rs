// ── Service-announcement discovery source ──
//
// Pluggable seam for zero-configuration lookup (multicast DNS or
// similar). The engine only needs candidate address/port pairs; merge
// and scoring stay identical whichever implementation is behind the
// trait.

use std::net::Ipv4Addr;

use async_trait::async_trait;

/// A source of announced candidate endpoints on the local segment.
///
/// Implementations must be bounded-time: return what is known now, do
/// not block on network convergence.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    async fn lookup(&self) -> Vec<(Ipv4Addr, u16)>;
}

/// Announcement lookup disabled. The default until a real mDNS
/// implementation is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnouncement;

#[async_trait]
impl AnnouncementSource for NoAnnouncement {
    async fn lookup(&self) -> Vec<(Ipv4Addr, u16)> {
        Vec::new()
    }
}
