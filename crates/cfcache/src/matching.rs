// SPDX-License-Identifier: Apache-2.0

use std::f64::consts::{PI, TAU};

use cfcache_model::CacheEntryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Found(CacheEntryId),
    NotFound,
}

impl MatchOutcome {
    #[must_use]
    pub const fn found(self) -> Option<CacheEntryId> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// Distance between two angles on the circle, in `[0, PI]`.
#[must_use]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    if d <= PI {
        return d;
    }
    let d = d.rem_euclid(TAU);
    d.min(TAU - d)
}

/// Rounding allowance on the tolerance comparison, in units of
/// `f64::EPSILON` relative to the largest operand.
const BOUNDARY_SLACK_EPSILONS: f64 = 4.0;

/// Operands larger than this do not widen the allowance further.
const BOUNDARY_SLACK_SCALE_CAP: f64 = 2.0 * TAU;

fn boundary_slack(angle: f64, query: f64, tolerance: f64) -> f64 {
    let scale = angle
        .abs()
        .max(query.abs())
        .max(tolerance)
        .min(BOUNDARY_SLACK_SCALE_CAP);
    BOUNDARY_SLACK_EPSILONS * f64::EPSILON * scale
}

/// Nearest stored angle within `tolerance` of `query`, all in radians.
///
/// The boundary is inclusive up to a few ulps of the operands, so
/// `search(&[a], a + t, t)` matches even when `a` and `t` were converted
/// from degrees and `a + t` rounded up. Anything a real epsilon such as
/// `1e-9` beyond the boundary misses.
///
/// Ties go to the lowest id. A negative or non-finite tolerance and a
/// non-finite query never match.
#[must_use]
pub fn search(angles: &[f64], query: f64, tolerance: f64) -> MatchOutcome {
    if !query.is_finite() || !tolerance.is_finite() || tolerance < 0.0 {
        return MatchOutcome::NotFound;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, angle) in angles.iter().enumerate() {
        let d = angular_distance(*angle, query);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    match best {
        Some((i, d)) if d <= tolerance + boundary_slack(angles[i], query, tolerance) => {
            CacheEntryId::from_index(i).map_or(MatchOutcome::NotFound, MatchOutcome::Found)
        }
        _ => MatchOutcome::NotFound,
    }
}
