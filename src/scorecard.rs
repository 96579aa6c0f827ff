// src/scorecard.rs
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

// --- Level Rules ---

pub const GOLD_MIN_TOTAL: f64 = 75.0;
pub const SILVER_MIN_TOTAL: f64 = 60.0;
pub const BRONZE_MIN_TOTAL: f64 = 40.0;
/// A Gold unit needs every category at or above this percentage.
pub const GOLD_CATEGORY_FLOOR_PCT: f64 = 60.0;
/// A Silver unit needs every category at or above this percentage.
pub const SILVER_CATEGORY_FLOOR_PCT: f64 = 40.0;
/// Category weights of a programme add up to this.
pub const TOTAL_WEIGHT: f64 = 100.0;

const WEIGHT_EPSILON: f64 = 1e-6;
const SCORE_EPSILON: f64 = 1e-9;

// --- Definitions ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub emerging: f64,
    pub advanced: f64,
    pub excellent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub id: String,
    pub label: String,
    pub category_id: String,
    pub weight: f64,
    pub thresholds: TierThresholds,
    /// Lower values are better (lead times, repeat-incident rates).
    #[serde(default)]
    pub inverse: bool,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    pub label: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
struct ScorecardFile {
    #[serde(default)]
    name: String,
    categories: Vec<CategoryDefinition>,
    kpis: Vec<KpiDefinition>,
}

/// A validated scoring programme. Construction is the only place
/// configuration errors can surface; scoring itself never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorecardDefinition {
    name: String,
    categories: Vec<CategoryDefinition>,
    kpis: Vec<KpiDefinition>,
}

fn check_weight(id: &str, weight: f64) -> Result<(), ConfigError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ConfigError::InvalidWeight {
            id: id.to_string(),
            weight,
        });
    }
    Ok(())
}

fn check_thresholds(kpi: &KpiDefinition) -> Result<(), ConfigError> {
    let t = kpi.thresholds;
    for (name, value) in [
        ("emerging", t.emerging),
        ("advanced", t.advanced),
        ("excellent", t.excellent),
    ] {
        if !value.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                kpi_id: kpi.id.clone(),
                threshold: name,
            });
        }
    }

    let ordered = if kpi.inverse {
        t.emerging >= t.advanced && t.advanced >= t.excellent
    } else {
        t.emerging <= t.advanced && t.advanced <= t.excellent
    };
    if !ordered {
        return Err(ConfigError::ThresholdOrder {
            kpi_id: kpi.id.clone(),
            direction: if kpi.inverse { "inverse" } else { "normal" },
            emerging: t.emerging,
            advanced: t.advanced,
            excellent: t.excellent,
        });
    }
    Ok(())
}

impl ScorecardDefinition {
    pub fn new(
        name: impl Into<String>,
        categories: Vec<CategoryDefinition>,
        kpis: Vec<KpiDefinition>,
    ) -> Result<Self, ConfigError> {
        if categories.is_empty() || kpis.is_empty() {
            return Err(ConfigError::EmptyScorecard);
        }

        let mut category_ids = HashSet::new();
        for category in &categories {
            if !category_ids.insert(category.id.as_str()) {
                return Err(ConfigError::DuplicateCategory {
                    category_id: category.id.clone(),
                });
            }
            check_weight(&category.id, category.weight)?;
            if category.weight == 0.0 {
                return Err(ConfigError::InvalidWeight {
                    id: category.id.clone(),
                    weight: category.weight,
                });
            }
        }

        let mut kpi_ids = HashSet::new();
        let mut kpi_totals: HashMap<&str, f64> = HashMap::new();
        for kpi in &kpis {
            if !kpi_ids.insert(kpi.id.as_str()) {
                return Err(ConfigError::DuplicateKpi {
                    kpi_id: kpi.id.clone(),
                });
            }
            if !category_ids.contains(kpi.category_id.as_str()) {
                return Err(ConfigError::UnknownCategory {
                    kpi_id: kpi.id.clone(),
                    category_id: kpi.category_id.clone(),
                });
            }
            check_weight(&kpi.id, kpi.weight)?;
            check_thresholds(kpi)?;
            *kpi_totals.entry(kpi.category_id.as_str()).or_insert(0.0) += kpi.weight;
        }

        for category in &categories {
            let kpi_total = kpi_totals.get(category.id.as_str()).copied().unwrap_or(0.0);
            if (kpi_total - category.weight).abs() > WEIGHT_EPSILON {
                return Err(ConfigError::CategoryWeightMismatch {
                    category_id: category.id.clone(),
                    declared: category.weight,
                    kpi_total,
                });
            }
        }

        let total: f64 = categories.iter().map(|c| c.weight).sum();
        if (total - TOTAL_WEIGHT).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::TotalWeightMismatch {
                total,
                expected: TOTAL_WEIGHT,
            });
        }

        let name = name.into();
        debug!(
            "Loaded scorecard '{}' with {} categories and {} KPIs",
            name,
            categories.len(),
            kpis.len()
        );
        Ok(Self {
            name,
            categories,
            kpis,
        })
    }

    /// Loads `{"name": ..., "categories": [...], "kpis": [...]}` and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: ScorecardFile =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::new(file.name, file.categories, file.kpis)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn kpis(&self) -> &[KpiDefinition] {
        &self.kpis
    }

    pub fn kpi(&self, kpi_id: &str) -> Option<&KpiDefinition> {
        self.kpis.iter().find(|kpi| kpi.id == kpi_id)
    }

    pub fn kpis_in<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a KpiDefinition> {
        self.kpis.iter().filter(move |kpi| kpi.category_id == category_id)
    }
}

// --- Tiers & Levels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    BelowEmerging,
    Emerging,
    Advanced,
    Excellent,
}

impl PerformanceTier {
    pub fn points(&self) -> u8 {
        match self {
            PerformanceTier::Excellent => 3,
            PerformanceTier::Advanced => 2,
            PerformanceTier::Emerging => 1,
            PerformanceTier::BelowEmerging => 0,
        }
    }
}

fn reaches(value: f64, threshold: f64, inverse: bool) -> bool {
    if inverse {
        value <= threshold
    } else {
        value >= threshold
    }
}

/// Highest tier whose threshold `value` reaches. Thresholds are inclusive.
pub fn classify_tier(value: f64, thresholds: &TierThresholds, inverse: bool) -> PerformanceTier {
    if reaches(value, thresholds.excellent, inverse) {
        PerformanceTier::Excellent
    } else if reaches(value, thresholds.advanced, inverse) {
        PerformanceTier::Advanced
    } else if reaches(value, thresholds.emerging, inverse) {
        PerformanceTier::Emerging
    } else {
        PerformanceTier::BelowEmerging
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    NonScoring,
    Bronze,
    Silver,
    Gold,
}

impl Level {
    pub fn from_total(total_score: f64) -> Self {
        if total_score + SCORE_EPSILON >= GOLD_MIN_TOTAL {
            Level::Gold
        } else if total_score + SCORE_EPSILON >= SILVER_MIN_TOTAL {
            Level::Silver
        } else if total_score + SCORE_EPSILON >= BRONZE_MIN_TOTAL {
            Level::Bronze
        } else {
            Level::NonScoring
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Gold => "Gold",
            Level::Silver => "Silver",
            Level::Bronze => "Bronze",
            Level::NonScoring => "Non-scoring",
        };
        write!(f, "{}", name)
    }
}

// --- Observations & Results ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiObservation {
    pub kpi_id: String,
    pub value: f64,
}

impl KpiObservation {
    pub fn new(kpi_id: impl Into<String>, value: f64) -> Self {
        Self {
            kpi_id: kpi_id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub kpi_id: String,
    pub category_id: String,
    pub weight: f64,
    /// `None` when no usable observation was supplied.
    pub observed_value: Option<f64>,
    pub missing: bool,
    pub tier: PerformanceTier,
    pub points: u8,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category_id: String,
    pub label: String,
    pub raw_score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorecardResult {
    pub category_scores: Vec<CategoryScore>,
    pub total_score: f64,
    /// Level from the total alone, before category floors.
    pub base_level: Level,
    pub level: Level,
    pub downgraded: bool,
    pub breakdown: Vec<ScoreBreakdown>,
    pub missing_kpis: Vec<String>,
}

fn score_kpi(kpi: &KpiDefinition, observed: Option<f64>) -> ScoreBreakdown {
    // No usable observation scores zero points whatever the direction.
    let tier = observed.map_or(PerformanceTier::BelowEmerging, |value| {
        classify_tier(value, &kpi.thresholds, kpi.inverse)
    });
    let points = tier.points();
    ScoreBreakdown {
        kpi_id: kpi.id.clone(),
        category_id: kpi.category_id.clone(),
        weight: kpi.weight,
        observed_value: observed,
        missing: observed.is_none(),
        tier,
        points,
        weighted_score: f64::from(points) * kpi.weight / 3.0,
    }
}

fn below_floor(categories: &[CategoryScore], floor_pct: f64) -> bool {
    categories
        .iter()
        .any(|category| category.percentage + SCORE_EPSILON < floor_pct)
}

/// Scores `observations` against `definition`.
///
/// Deterministic and total: missing or non-finite observations count as zero
/// points, observations of unknown KPIs are ignored and a repeated KPI keeps
/// its last value.
pub fn compute_scorecard(
    definition: &ScorecardDefinition,
    observations: &[KpiObservation],
) -> ScorecardResult {
    let mut observed: HashMap<&str, f64> = HashMap::new();
    for observation in observations {
        if definition.kpi(&observation.kpi_id).is_none() {
            warn!(
                "Ignoring observation for unknown KPI '{}'",
                observation.kpi_id
            );
            continue;
        }
        observed.insert(observation.kpi_id.as_str(), observation.value);
    }

    let breakdown: Vec<ScoreBreakdown> = definition
        .kpis()
        .iter()
        .map(|kpi| {
            let value = observed
                .get(kpi.id.as_str())
                .copied()
                .filter(|v| v.is_finite());
            score_kpi(kpi, value)
        })
        .collect();

    let missing_kpis: Vec<String> = breakdown
        .iter()
        .filter(|b| b.missing)
        .map(|b| b.kpi_id.clone())
        .collect();
    if !missing_kpis.is_empty() {
        warn!(
            "Scorecard '{}' is missing {} KPI observations: {:?}",
            definition.name(),
            missing_kpis.len(),
            missing_kpis
        );
    }

    let category_scores: Vec<CategoryScore> = definition
        .categories()
        .iter()
        .map(|category| {
            let (raw_score, max_score) = breakdown
                .iter()
                .filter(|b| b.category_id == category.id)
                .fold((0.0, 0.0), |(raw, max), b| (raw + b.weighted_score, max + b.weight));
            let percentage = if max_score > 0.0 {
                raw_score * 100.0 / max_score
            } else {
                0.0
            };
            CategoryScore {
                category_id: category.id.clone(),
                label: category.label.clone(),
                raw_score,
                max_score,
                percentage,
            }
        })
        .collect();

    let total_score: f64 = category_scores.iter().map(|c| c.raw_score).sum();
    let base_level = Level::from_total(total_score);

    // Two-step cascade: each step looks at the level the previous one left.
    let mut level = base_level;
    if level == Level::Gold && below_floor(&category_scores, GOLD_CATEGORY_FLOOR_PCT) {
        level = Level::Silver;
    }
    if level == Level::Silver && below_floor(&category_scores, SILVER_CATEGORY_FLOOR_PCT) {
        level = Level::Bronze;
    }
    let downgraded = level != base_level;

    info!(
        "Scorecard '{}': total {:.2} -> {} (base {}, downgraded: {})",
        definition.name(),
        total_score,
        level,
        base_level,
        downgraded
    );

    ScorecardResult {
        category_scores,
        total_score,
        base_level,
        level,
        downgraded,
        breakdown,
        missing_kpis,
    }
}
