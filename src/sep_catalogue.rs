// src/sep_catalogue.rs
//! Built-in SEP 2025 programme: Foundation (40) and Services Growth (60).

use crate::error::ConfigError;
use crate::scorecard::{CategoryDefinition, KpiDefinition, ScorecardDefinition, TierThresholds};

pub const FOUNDATION: &str = "foundation_ops";
pub const SERVICES_GROWTH: &str = "services_growth";

fn kpi(
    id: &str,
    label: &str,
    category_id: &str,
    weight: f64,
    (excellent, advanced, emerging): (f64, f64, f64),
    inverse: bool,
    unit: &str,
) -> KpiDefinition {
    KpiDefinition {
        id: id.to_string(),
        label: label.to_string(),
        category_id: category_id.to_string(),
        weight,
        thresholds: TierThresholds {
            emerging,
            advanced,
            excellent,
        },
        inverse,
        unit: unit.to_string(),
    }
}

/// The SEP 2025 catalogue of 13 KPIs.
pub fn sep_2025() -> Result<ScorecardDefinition, ConfigError> {
    let categories = vec![
        CategoryDefinition {
            id: FOUNDATION.to_string(),
            label: "Foundation".to_string(),
            weight: 40.0,
        },
        CategoryDefinition {
            id: SERVICES_GROWTH.to_string(),
            label: "Services Growth".to_string(),
            weight: 60.0,
        },
    ];

    // Thresholds read (excellent, advanced, emerging).
    let kpis = vec![
        kpi("service_rif", "Service RIF", FOUNDATION, 12.0, (0.5, 0.8, 1.3), true, ""),
        kpi("tech_productivity", "Technician Productivity", FOUNDATION, 6.0, (85.0, 82.0, 78.0), false, "%"),
        kpi("tech_capacity", "Technician Capacity (Tech Plan)", FOUNDATION, 6.0, (98.0, 96.0, 94.0), false, "%"),
        kpi("llti", "Last Labor to Invoice", FOUNDATION, 5.0, (7.0, 12.0, 17.0), true, "days"),
        kpi("tech_capability", "Technician Capability (TCDPA)", FOUNDATION, 6.0, (95.0, 85.0, 60.0), false, "%"),
        kpi("data_quality", "Service Data Quality", FOUNDATION, 5.0, (95.0, 90.0, 85.0), false, "%"),
        kpi("service_response", "Service Response (Started by 2nd Day)", SERVICES_GROWTH, 10.0, (85.0, 75.0, 65.0), false, "%"),
        kpi("remote_flash", "Remote Service (Flash)", SERVICES_GROWTH, 4.0, (60.0, 50.0, 40.0), false, "%"),
        kpi("remote_troubleshoot", "Remote Service (Troubleshoot)", SERVICES_GROWTH, 4.0, (40.0, 30.0, 20.0), false, "%"),
        kpi("cva_fulfillment", "CVA Fulfillment", SERVICES_GROWTH, 12.0, (80.0, 70.0, 60.0), false, "%"),
        kpi("cva_pm_accuracy", "CVA PM Accuracy", SERVICES_GROWTH, 10.0, (85.0, 82.0, 78.0), false, "%"),
        kpi("inspection_rate", "Inspection Rate", SERVICES_GROWTH, 12.0, (65.0, 50.0, 40.0), false, "%"),
        kpi("cma_recommendation", "CMA Recommendation Coverage", SERVICES_GROWTH, 8.0, (10.0, 5.0, 2.5), false, "%"),
    ];

    ScorecardDefinition::new("SEP 2025", categories, kpis)
}
