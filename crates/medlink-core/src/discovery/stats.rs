// ── Discovery statistics ──
//
// Running counters plus the "hot ranges" heuristic: contiguous runs of
// last-octet values across found devices become the ranges the next
// sweep probes first.

use std::net::Ipv4Addr;

use crate::model::{DeviceDescriptor, DiscoveryStats, OctetRange};

/// How many hot ranges are carried between runs.
const MAX_COMMON_RANGES: usize = 5;

impl DiscoveryStats {
    /// Record one completed discovery run that found `found` devices.
    pub fn record_run(&mut self, found: usize) {
        self.attempts += 1;
        if found > 0 {
            self.successes += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            let n = self.attempts as f64;
            self.avg_devices_found += (found as f64 - self.avg_devices_found) / n;
        }
    }
}

/// Recompute the hot-range set from this run's devices, merged with
/// the previous ranges. Largest ranges win; containment dedupes.
pub fn derive_common_ranges(
    devices: &[DeviceDescriptor],
    previous: &[OctetRange],
) -> Vec<OctetRange> {
    let mut merged = contiguous_runs(devices.iter().map(|d| last_octet(d.ip_address)));
    merged.extend_from_slice(previous);

    // Largest first; equal sizes keep lower start addresses first.
    merged.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));

    let mut kept: Vec<OctetRange> = Vec::new();
    for range in merged {
        let contained = kept
            .iter()
            .any(|k| k.start <= range.start && range.end <= k.end);
        if !contained {
            kept.push(range);
        }
        if kept.len() == MAX_COMMON_RANGES {
            break;
        }
    }
    kept
}

fn last_octet(ip: Ipv4Addr) -> u8 {
    ip.octets()[3]
}

/// Collapse a set of octet values into inclusive contiguous ranges.
fn contiguous_runs(octets: impl Iterator<Item = u8>) -> Vec<OctetRange> {
    let mut values: Vec<u8> = octets.collect();
    values.sort_unstable();
    values.dedup();

    let mut runs = Vec::new();
    let mut iter = values.into_iter();
    let Some(first) = iter.next() else {
        return runs;
    };

    let mut start = first;
    let mut end = first;
    for v in iter {
        if v == end + 1 {
            end = v;
        } else {
            runs.push(OctetRange::new(start, end));
            start = v;
            end = v;
        }
    }
    runs.push(OctetRange::new(start, end));
    runs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::Capabilities;
    use chrono::Utc;

    fn device(last_octet: u8) -> DeviceDescriptor {
        DeviceDescriptor {
            ip_address: Ipv4Addr::new(192, 168, 1, last_octet),
            port: 3000,
            name: format!("edge-{last_octet}"),
            version: None,
            capabilities: Capabilities::default(),
            response_time_ms: 100,
            quality: 0.5,
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn record_run_keeps_running_average() {
        let mut stats = DiscoveryStats::default();
        stats.record_run(2);
        stats.record_run(0);
        stats.record_run(4);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.avg_devices_found, 2.0);
    }

    #[test]
    fn contiguous_octets_collapse_into_one_range() {
        let devices: Vec<_> = [5, 6, 7].into_iter().map(device).collect();
        let ranges = derive_common_ranges(&devices, &[]);
        assert_eq!(ranges, vec![OctetRange::new(5, 7)]);
    }

    #[test]
    fn gaps_split_ranges() {
        let devices: Vec<_> = [5, 6, 42].into_iter().map(device).collect();
        let ranges = derive_common_ranges(&devices, &[]);
        assert!(ranges.contains(&OctetRange::new(5, 6)));
        assert!(ranges.contains(&OctetRange::new(42, 42)));
    }

    #[test]
    fn previous_ranges_merge_and_largest_win() {
        let devices: Vec<_> = [200].into_iter().map(device).collect();
        let previous = [
            OctetRange::new(1, 10),
            OctetRange::new(100, 110),
            OctetRange::new(50, 52),
            OctetRange::new(60, 61),
            OctetRange::new(70, 70),
        ];
        let ranges = derive_common_ranges(&devices, &previous);

        // Largest ranges first; the cap squeezes out the smallest.
        assert_eq!(
            ranges,
            vec![
                OctetRange::new(100, 110),
                OctetRange::new(1, 10),
                OctetRange::new(50, 52),
                OctetRange::new(60, 61),
                OctetRange::new(70, 70),
            ]
        );
    }

    #[test]
    fn contained_ranges_are_dropped() {
        let devices: Vec<_> = [103, 104].into_iter().map(device).collect();
        let previous = [OctetRange::new(100, 110)];
        let ranges = derive_common_ranges(&devices, &previous);
        assert_eq!(ranges, vec![OctetRange::new(100, 110)]);
    }

    #[test]
    fn empty_inputs_yield_no_ranges() {
        assert!(derive_common_ranges(&[], &[]).is_empty());
    }
}
