// ── Device quality scoring ──
//
// Pure functions turning probe measurements into a comparable [0,1]
// score. Weighting: latency dominates (0.6), advertised capabilities
// matter (0.3), reported firmware version is a tiebreaker (0.1).

use crate::model::Capabilities;

/// Latency at or below which a device scores a full 1.0.
const RESPONSE_FLOOR_MS: f64 = 50.0;
/// Latency at or above which a device scores 0.0.
const RESPONSE_CEILING_MS: f64 = 1000.0;

/// Latency component: 50 ms or better is 1.0, 1000 ms or worse is 0.0,
/// linear in between.
pub fn response_score(response_time_ms: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let ms = response_time_ms as f64;
    (1.0 - (ms - RESPONSE_FLOOR_MS) / (RESPONSE_CEILING_MS - RESPONSE_FLOOR_MS)).clamp(0.0, 1.0)
}

/// Capability component: a 0.5 baseline plus weighted feature flags.
/// Offline translation is the flag that matters most -- it is the whole
/// point of an edge device.
pub fn capability_score(caps: &Capabilities) -> f64 {
    let mut score = 0.5;
    if caps.offline_translation {
        score += 0.2;
    }
    if caps.audio_processing {
        score += 0.1;
    }
    if caps.high_performance {
        score += 0.1;
    }
    if caps.low_latency {
        score += 0.1;
    }
    score
}

/// Version component: parsed from a `major.minor.patch` prefix.
/// Unparsable or absent versions score a neutral 0.5.
pub fn version_score(version: Option<&str>) -> f64 {
    let Some((major, minor)) = parse_major_minor(version) else {
        return 0.5;
    };
    (f64::from(major) * 0.1 + f64::from(minor) * 0.01 + 0.3).min(1.0)
}

/// Combined quality score.
pub fn quality(response_time_ms: u64, caps: &Capabilities, version: Option<&str>) -> f64 {
    0.6 * response_score(response_time_ms)
        + 0.3 * capability_score(caps)
        + 0.1 * version_score(version)
}

/// Extract `(major, minor)` from a semver-like string. Accepts an
/// optional leading `v` and trailing pre-release junk on the patch
/// component ("v1.2.3-beta" parses as (1, 2)).
fn parse_major_minor(version: Option<&str>) -> Option<(u32, u32)> {
    let v = version?.trim().trim_start_matches('v');
    let mut parts = v.split('.');

    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;

    // Require at least a patch component to look semver-like, but
    // tolerate suffixes ("3-beta", "3+build").
    let patch = parts.next()?;
    let digits: String = patch.chars().take_while(char::is_ascii_digit).collect();
    let _: u32 = digits.parse().ok()?;

    Some((major, minor))
}
