// ── Device discovery ──
//
// Three candidate sources feed one probe pool: previously known
// devices, local-segment service announcements, and a subnet sweep.
// Results are merged, scored, ranked, and persisted.

mod announce;
mod engine;
pub mod stats;
pub mod sweep;

pub use announce::{AnnouncementSource, NoAnnouncement};
pub use engine::{
    DiscoverOptions, DiscoveryConfig, DiscoveryEngine, DiscoveryReport, SweepSkipReason,
};
