//! Derived pull-request and project metrics.
//!
//! Everything here is pure. Numeric inputs that are negative, NaN or infinite
//! are rejected with [`HubError::InvalidInput`] rather than producing NaN.

use serde::Serialize;

use crate::error::{HubError, Result};
use crate::github::models::{PullRequest, Repository, RiskLevel};
use crate::util::time::round_tenth;

const DEFAULT_BAR_SEED: u64 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Mean cycle time rounded to one decimal. `None` when there are no PRs,
    /// which means "no data", not zero velocity.
    pub average_cycle_days: Option<f64>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub complexity: f64,
    pub devs: u32,
    pub projected_days: u64,
    pub success_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepositoryPulse {
    pub lead_time_hours: f64,
    pub deploys_per_week: u64,
    pub success_rate: f64,
}

fn check_finite(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(HubError::invalid(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )));
    }
    Ok(value)
}

fn check_percent(name: &str, value: f64) -> Result<f64> {
    let value = check_finite(name, value)?;
    if value > 100.0 {
        return Err(HubError::invalid(format!(
            "{name} must be between 0 and 100, got {value}"
        )));
    }
    Ok(value)
}

fn check_devs(devs: u32) -> Result<f64> {
    if devs == 0 {
        return Err(HubError::invalid("devs must be at least 1"));
    }
    Ok(devs as f64)
}

/// Arithmetic mean of `cycle_days`; 0 for an empty slice.
pub fn average_cycle_time(prs: &[PullRequest]) -> Result<f64> {
    if prs.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    for pr in prs {
        sum += check_finite("cycle_days", pr.cycle_days)?;
    }
    Ok(sum / prs.len() as f64)
}

/// Mean cycle time (one decimal) and count. PRs with an unusable cycle time
/// are left out of the mean but still counted.
pub fn summarize(prs: &[PullRequest]) -> Metrics {
    let valid: Vec<f64> = prs
        .iter()
        .map(|pr| pr.cycle_days)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .collect();
    let average_cycle_days = if valid.is_empty() {
        None
    } else {
        Some(round_tenth(valid.iter().sum::<f64>() / valid.len() as f64))
    };
    Metrics {
        average_cycle_days,
        total: prs.len(),
    }
}

/// The first `floor(percent / 100 * len)` items. A prefix, not a sample.
pub fn windowed_subset<T>(items: &[T], percent: f64) -> Result<&[T]> {
    let percent = check_percent("percent", percent)?;
    let take = (percent / 100.0 * items.len() as f64).floor() as usize;
    Ok(&items[..take.min(items.len())])
}

/// `max(1, round(complexity * 2.5 / (devs * 1.2)))`
pub fn projected_completion_days(complexity: f64, devs: u32) -> Result<u64> {
    let complexity = check_percent("complexity", complexity)?;
    let devs = check_devs(devs)?;
    let days = (complexity * 2.5 / (devs * 1.2)).round();
    Ok((days as u64).max(1))
}

/// `clamp(100 - complexity / 1.5 + devs * 2, 15, 99.9)`
pub fn success_probability(complexity: f64, devs: u32) -> Result<f64> {
    let complexity = check_percent("complexity", complexity)?;
    let devs = check_devs(devs)?;
    Ok((100.0 - complexity / 1.5 + devs * 2.0).clamp(15.0, 99.9))
}

pub fn project(complexity: f64, devs: u32) -> Result<Projection> {
    Ok(Projection {
        complexity,
        devs,
        projected_days: projected_completion_days(complexity, devs)?,
        success_probability: round_tenth(success_probability(complexity, devs)?),
    })
}

/// Starting complexity for the simulator given a caller-supplied risk label.
pub fn suggested_complexity(risk: Option<RiskLevel>) -> f64 {
    match risk {
        Some(RiskLevel::High | RiskLevel::Critical) => 85.0,
        Some(RiskLevel::Medium) => 55.0,
        _ => 25.0,
    }
}

/// Starting team size for the simulator: one developer per hundred stars,
/// between 2 and 10.
pub fn suggested_dev_count(stars: u64) -> u32 {
    (stars / 100).clamp(2, 10) as u32
}

pub fn repository_pulse(repo: &Repository) -> RepositoryPulse {
    let stars = repo.stargazers_count as f64;
    let issues = repo.open_issues_count as f64;
    RepositoryPulse {
        lead_time_hours: round_tenth(4.2 + stars / 1000.0),
        deploys_per_week: (12.0 + stars / 500.0).floor() as u64,
        success_rate: round_tenth(99.8 - issues / 20.0),
    }
}

/// Deterministic chart heights in `30..100`, stable per seed.
pub fn activity_bars(seed: Option<u64>, count: usize) -> Vec<u64> {
    let seed = seed.unwrap_or(DEFAULT_BAR_SEED);
    (1..=count as u64)
        .map(|i| (seed.wrapping_mul(i) % 70) + 30)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_finite_rejects_nan_and_negative() {
        assert!(check_finite("x", f64::NAN).is_err());
        assert!(check_finite("x", f64::INFINITY).is_err());
        assert!(check_finite("x", -0.5).is_err());
        assert_eq!(check_finite("x", 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_check_devs_rejects_zero() {
        assert!(check_devs(0).is_err());
        assert_eq!(check_devs(3).unwrap(), 3.0);
    }
}
