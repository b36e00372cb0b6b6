//! Westgard multirule evaluation for Levey–Jennings charts.
//!
//! Rules are evaluated on z-scores of consecutive control results:
//!
//! | Rule   | Triggers when                                                 | Kind      |
//! |--------|---------------------------------------------------------------|-----------|
//! | `1_2s` | one result beyond ±2 SD                                       | warning   |
//! | `1_3s` | one result beyond ±3 SD                                       | rejection |
//! | `2_2s` | two consecutive results beyond 2 SD on the same side          | rejection |
//! | `R_4s` | two consecutive results differ by more than 4 SD              | rejection |
//! | `4_1s` | four consecutive results beyond 1 SD on the same side         | rejection |
//! | `10_x` | ten consecutive results on the same side of the mean          | rejection |
//!
//! A violation is reported at the last point of the triggering run. Points
//! exactly on a boundary do not trigger.
//!
//! # References
//!
//! - Westgard, J.O., Barry, P.L., Hunt, M.R. & Groth, T. (1981). "A multi-rule
//!   Shewhart chart for quality control in clinical chemistry".
//!   *Clinical Chemistry* 27(3), pp. 493-501.

use serde::{Deserialize, Serialize};

use super::chart::{ChartPoint, ControlLimits};

/// Westgard control rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WestgardRule {
    /// One result beyond ±2 SD.
    #[serde(rename = "1_2s")]
    Warning1_2s,
    /// One result beyond ±3 SD.
    #[serde(rename = "1_3s")]
    Reject1_3s,
    /// Two consecutive results beyond 2 SD, same side.
    #[serde(rename = "2_2s")]
    Reject2_2s,
    /// Consecutive results more than 4 SD apart.
    #[serde(rename = "R_4s")]
    RejectR4s,
    /// Four consecutive results beyond 1 SD, same side.
    #[serde(rename = "4_1s")]
    Reject4_1s,
    /// Ten consecutive results on the same side of the mean.
    #[serde(rename = "10_x")]
    Reject10x,
}

impl WestgardRule {
    /// Whether the rule rejects the run (everything but 1₂ₛ).
    pub fn is_rejection(self) -> bool {
        !matches!(self, WestgardRule::Warning1_2s)
    }

    /// Conventional short code, e.g. `"2_2s"`.
    pub fn code(self) -> &'static str {
        match self {
            WestgardRule::Warning1_2s => "1_2s",
            WestgardRule::Reject1_3s => "1_3s",
            WestgardRule::Reject2_2s => "2_2s",
            WestgardRule::RejectR4s => "R_4s",
            WestgardRule::Reject4_1s => "4_1s",
            WestgardRule::Reject10x => "10_x",
        }
    }
}

/// Trait for applying run rules to chart data.
pub trait RunRule {
    /// Check points against this rule set.
    ///
    /// Returns `(point_index, rule)` pairs. A point may appear more than once
    /// if it triggers several rules.
    fn check(&self, points: &[ChartPoint], limits: &ControlLimits) -> Vec<(usize, WestgardRule)>;
}

/// The six-rule Westgard multirule set.
pub struct WestgardRules;

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// +1 above the band, −1 below, 0 within.
fn side_beyond(z: f64, band: f64) -> i8 {
    if z > band {
        1
    } else if z < -band {
        -1
    } else {
        0
    }
}

/// Flags the last point of every window of `len` points all beyond `band`
/// on the same side.
fn same_side_run(
    points: &[ChartPoint],
    len: usize,
    band: f64,
    rule: WestgardRule,
) -> Vec<(usize, WestgardRule)> {
    let mut violations = Vec::new();
    if points.len() < len {
        return violations;
    }
    let sides: Vec<i8> = points.iter().map(|p| side_beyond(p.z_score, band)).collect();
    let mut run_length = 0_usize;
    for i in 0..sides.len() {
        if sides[i] != 0 && i > 0 && sides[i] == sides[i - 1] {
            run_length += 1;
        } else if sides[i] != 0 {
            run_length = 1;
        } else {
            run_length = 0;
        }
        if run_length >= len {
            violations.push((points[i].index, rule));
        }
    }
    violations
}

/// 1₂ₛ and 1₃ₛ: single results beyond 2 SD / 3 SD.
fn check_single(points: &[ChartPoint]) -> Vec<(usize, WestgardRule)> {
    let mut violations = Vec::new();
    for point in points {
        let z = point.z_score.abs();
        if z > 2.0 {
            violations.push((point.index, WestgardRule::Warning1_2s));
        }
        if z > 3.0 {
            violations.push((point.index, WestgardRule::Reject1_3s));
        }
    }
    violations
}

/// R₄ₛ: consecutive results more than 4 SD apart.
fn check_range(points: &[ChartPoint]) -> Vec<(usize, WestgardRule)> {
    points
        .windows(2)
        .filter(|w| (w[1].z_score - w[0].z_score).abs() > 4.0)
        .map(|w| (w[1].index, WestgardRule::RejectR4s))
        .collect()
}

impl RunRule for WestgardRules {
    fn check(&self, points: &[ChartPoint], limits: &ControlLimits) -> Vec<(usize, WestgardRule)> {
        if !limits.is_usable() {
            return Vec::new();
        }
        let mut results = Vec::new();
        results.extend(check_single(points));
        results.extend(same_side_run(points, 2, 2.0, WestgardRule::Reject2_2s));
        results.extend(check_range(points));
        results.extend(same_side_run(points, 4, 1.0, WestgardRule::Reject4_1s));
        results.extend(same_side_run(points, 10, 0.0, WestgardRule::Reject10x));
        results.sort_by_key(|&(idx, _)| idx);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: chart points from z-scores (mean 0, sd 1).
    fn make_points(zs: &[f64]) -> Vec<ChartPoint> {
        zs.iter()
            .enumerate()
            .map(|(i, &z)| ChartPoint {
                index: i,
                date: String::new(),
                value: z,
                z_score: z,
                violations: Vec::new(),
            })
            .collect()
    }

    fn unit_limits() -> ControlLimits {
        ControlLimits::new(0.0, 1.0)
    }

    fn fired(zs: &[f64], rule: WestgardRule) -> Vec<usize> {
        WestgardRules
            .check(&make_points(zs), &unit_limits())
            .into_iter()
            .filter(|&(_, r)| r == rule)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn rule_1_2s_warning() {
        assert_eq!(fired(&[0.0, 2.1, -2.5, 2.0], WestgardRule::Warning1_2s), [1, 2]);
        assert!(!WestgardRule::Warning1_2s.is_rejection());
    }

    #[test]
    fn rule_1_3s() {
        assert_eq!(fired(&[0.0, -3.2, 3.0], WestgardRule::Reject1_3s), [1]);
    }

    #[test]
    fn rule_2_2s_same_side_only() {
        assert_eq!(fired(&[2.1, 2.2, 0.0], WestgardRule::Reject2_2s), [1]);
        assert!(fired(&[2.1, -2.2], WestgardRule::Reject2_2s).is_empty());
        assert!(fired(&[2.1, 0.0, 2.2], WestgardRule::Reject2_2s).is_empty());
    }

    #[test]
    fn rule_r_4s() {
        assert_eq!(fired(&[2.1, -2.1, 0.0], WestgardRule::RejectR4s), [1]);
        assert!(fired(&[2.0, -2.0], WestgardRule::RejectR4s).is_empty());
    }

    #[test]
    fn rule_4_1s() {
        assert_eq!(
            fired(&[1.2, 1.5, 1.1, 1.3, 1.4], WestgardRule::Reject4_1s),
            [3, 4]
        );
        assert!(fired(&[1.2, 1.5, 0.5, 1.3, 1.4], WestgardRule::Reject4_1s).is_empty());
        assert!(fired(&[-1.2, -1.5, 1.1, 1.3], WestgardRule::Reject4_1s).is_empty());
    }

    #[test]
    fn rule_10_x() {
        let mut zs = vec![0.3; 10];
        assert_eq!(fired(&zs, WestgardRule::Reject10x), [9]);
        zs[4] = -0.1;
        assert!(fired(&zs, WestgardRule::Reject10x).is_empty());
        // on the mean breaks the run
        let zs = [0.2, 0.2, 0.2, 0.0, 0.2, 0.2, 0.2, 0.2, 0.2, 0.2, 0.2];
        assert!(fired(&zs, WestgardRule::Reject10x).is_empty());
    }

    #[test]
    fn results_sorted_by_index() {
        let out = WestgardRules.check(&make_points(&[3.5, 0.0, 2.5, 2.6]), &unit_limits());
        let idx: Vec<usize> = out.iter().map(|&(i, _)| i).collect();
        let mut sorted = idx.clone();
        sorted.sort_unstable();
        assert_eq!(idx, sorted);
    }

    #[test]
    fn unusable_limits_yield_nothing() {
        let out = WestgardRules.check(&make_points(&[9.0, 9.0]), &ControlLimits::new(0.0, 0.0));
        assert!(out.is_empty());
    }

    #[test]
    fn rule_codes() {
        assert_eq!(WestgardRule::RejectR4s.code(), "R_4s");
        assert_eq!(
            serde_json::to_string(&WestgardRule::Reject10x).unwrap(),
            "\"10_x\""
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn points_from(zs: &[f64]) -> Vec<ChartPoint> {
        zs.iter()
            .enumerate()
            .map(|(i, &z)| ChartPoint {
                index: i,
                date: String::new(),
                value: z,
                z_score: z,
                violations: Vec::new(),
            })
            .collect()
    }

    proptest! {
        #[test]
        fn indices_in_range_and_sorted(zs in proptest::collection::vec(-5.0_f64..5.0, 0..40)) {
            let out = WestgardRules.check(&points_from(&zs), &ControlLimits::new(0.0, 1.0));
            for pair in out.windows(2) {
                prop_assert!(pair[0].0 <= pair[1].0);
            }
            prop_assert!(out.iter().all(|&(i, _)| i < zs.len()));
        }

        #[test]
        fn within_one_sd_alternating_is_clean(zs in proptest::collection::vec(0.0_f64..1.0, 0..40)) {
            // alternate sides so no same-side run can form
            let zs: Vec<f64> = zs
                .iter()
                .enumerate()
                .map(|(i, &z)| if i % 2 == 0 { z } else { -z })
                .collect();
            let out = WestgardRules.check(&points_from(&zs), &ControlLimits::new(0.0, 1.0));
            prop_assert!(out.is_empty(), "unexpected {:?}", out);
        }
    }
}
