// src/correlation.rs
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::aggregation::MonthlySeries;
use crate::records::TeamId;

/// A team whose monthly productivity could be compared with the global trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverTeam {
    pub team_id: TeamId,
    /// Pearson coefficient against the global series, in [-1, 1].
    pub score: f64,
    pub overlapping_periods: usize,
}

/// Pearson correlation coefficient of two equally long samples.
///
/// `None` with fewer than two points, mismatched lengths, a constant sample or
/// any non-finite value.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x * var_y).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlates each team's series with the global one over the months both
/// contain. Teams that cannot be scored are left out. Ordered by score
/// descending, then team id.
pub fn team_correlations(
    global_series: &MonthlySeries,
    team_series: &BTreeMap<TeamId, MonthlySeries>,
) -> Vec<DriverTeam> {
    let mut scored: Vec<DriverTeam> = team_series
        .iter()
        .filter_map(|(team_id, series)| {
            let (team_values, global_values): (Vec<f64>, Vec<f64>) = series
                .iter()
                .filter_map(|(month, value)| global_series.get(month).map(|global| (*value, *global)))
                .unzip();

            match pearson(&team_values, &global_values) {
                Some(score) => Some(DriverTeam {
                    team_id: team_id.clone(),
                    score,
                    overlapping_periods: team_values.len(),
                }),
                None => {
                    debug!(
                        "Skipping team {} for driver analysis ({} overlapping months)",
                        team_id,
                        team_values.len()
                    );
                    None
                }
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.team_id.cmp(&b.team_id)));
    scored
}

/// The team whose trend tracks the global trend most closely. This is a
/// ranking heuristic, not a causal claim.
pub fn find_driver_team(
    global_series: &MonthlySeries,
    team_series: &BTreeMap<TeamId, MonthlySeries>,
) -> Option<DriverTeam> {
    let driver = team_correlations(global_series, team_series).into_iter().next();
    match &driver {
        Some(team) => info!(
            "Driver team is {} (r = {:.3} over {} months)",
            team.team_id, team.score, team.overlapping_periods
        ),
        None => info!("No team has enough overlapping months to pick a driver"),
    }
    driver
}
