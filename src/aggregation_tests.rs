// src/aggregation_tests.rs

#[cfg(test)]
mod tests {
    use crate::aggregation::*;
    use crate::period::{MonthKey, WeekKey};
    use crate::records::{normalize_rows, PunchRecord, RawPunchRow};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    // Helper to build canonical records in tests
    fn record(date: &str, tech: &str, team: &str, worked: Decimal, billable: Decimal) -> PunchRecord {
        PunchRecord {
            date: d(date),
            technician_id: tech.to_string(),
            team_id: team.to_string(),
            hours_worked: worked,
            hours_billable: billable,
        }
    }

    fn sample_records() -> Vec<PunchRecord> {
        vec![
            record("2025-01-06", "T1", "Atelier", dec!(8), dec!(7)),
            record("2025-01-07", "T1", "Atelier", dec!(8), dec!(6)),
            record("2025-01-06", "T2", "Atelier", dec!(8), dec!(4)),
            record("2025-02-03", "T2", "Atelier", dec!(7.5), dec!(7.5)),
            record("2025-01-06", "T3", "Terrain", dec!(10), dec!(9)),
            record("2025-02-04", "T3", "Terrain", dec!(6), dec!(3)),
        ]
    }

    #[test]
    fn ratio_is_sum_over_sum_not_mean_of_row_ratios() {
        // 8/8 and 0/2 for the same technician: 8/10, not mean(1.0, 0.0)
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 8.0, 8.0),
            RawPunchRow::new("2025-01-07", "T1", "Atelier", 2.0, 0.0),
        ];
        let normalized = normalize_rows(&rows);

        let by_tech = aggregate(&normalized.records, Grouping::Technician);

        assert_eq!(by_tech.len(), 1);
        assert_eq!(by_tech[0].ratio, 0.8);
        assert_ne!(by_tech[0].ratio, 0.5);
        assert_eq!(aggregate_global(&normalized.records).ratio, 0.8);
    }

    #[test]
    fn duplicate_rows_of_one_day_are_merged_before_the_ratio() {
        let rows = vec![
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 6.0, 6.0),
            RawPunchRow::new("2025-01-06", "T1", "Atelier", 2.0, 0.0),
            RawPunchRow::new("2025-01-07", "T1", "Atelier", 2.0, 0.0),
        ];
        let normalized = normalize_rows(&rows);
        let by_day = aggregate(&normalized.records, Grouping::Day);
        assert_eq!(by_day[0].ratio, 0.75);
        assert_eq!(by_day[1].ratio, 0.0);
        assert_eq!(aggregate_global(&normalized.records).ratio, 0.6);
    }

    #[test]
    fn zero_worked_hours_give_zero_ratio() {
        let records = vec![record("2025-01-06", "T1", "Atelier", dec!(0), dec!(3))];
        let global = aggregate_global(&records);
        assert_eq!(global.ratio, 0.0);
        assert_eq!(global.sum_hours_billable, dec!(3));

        let empty = aggregate_global(&[]);
        assert_eq!(empty.ratio, 0.0);
        assert_eq!(empty.record_count, 0);
    }

    #[test]
    fn billable_above_worked_is_tolerated() {
        let records = vec![record("2025-01-06", "T1", "Atelier", dec!(4), dec!(5))];
        assert_eq!(aggregate_global(&records).ratio, 1.25);
    }

    #[test]
    fn merging_partial_aggregates_matches_aggregating_the_union() {
        let records = sample_records();
        for split in 0..=records.len() {
            let (a, b) = records.split_at(split);
            let merged = aggregate_global(a).merge(&aggregate_global(b));
            assert_eq!(merged, aggregate_global(&records), "split at {}", split);
        }

        // Same property per team: January and February aggregated separately.
        let (jan, feb): (Vec<PunchRecord>, Vec<PunchRecord>) = records
            .iter()
            .cloned()
            .partition(|r| MonthKey::of(r.date) == MonthKey { year: 2025, month: 1 });
        let whole = aggregate(&records, Grouping::Team);
        let jan_by_team = aggregate(&jan, Grouping::Team);
        let feb_by_team = aggregate(&feb, Grouping::Team);
        for team_agg in &whole {
            let from_jan = jan_by_team.iter().find(|a| a.scope == team_agg.scope).unwrap();
            let from_feb = feb_by_team.iter().find(|a| a.scope == team_agg.scope).unwrap();
            assert_eq!(&from_jan.merge(from_feb), team_agg);
        }
    }

    #[test]
    fn monthly_grouping_orders_months() {
        let monthly = aggregate(&sample_records(), Grouping::Month);
        assert_eq!(monthly.len(), 2);
        assert_eq!(
            monthly[0].scope,
            AggregateScope::Month {
                month: MonthKey { year: 2025, month: 1 }
            }
        );
        assert_eq!(monthly[0].sum_hours_worked, dec!(34));
        assert_eq!(monthly[0].sum_hours_billable, dec!(26));
        assert_eq!(monthly[1].sum_hours_worked, dec!(13.5));
        assert_eq!(monthly[1].sum_hours_billable, dec!(10.5));
    }

    #[test]
    fn team_month_grouping_feeds_team_series() {
        let series = team_monthly_series(&sample_records());
        assert_eq!(series.len(), 2);
        let terrain = &series["Terrain"];
        assert_eq!(terrain[&MonthKey { year: 2025, month: 1 }], 0.9);
        assert_eq!(terrain[&MonthKey { year: 2025, month: 2 }], 0.5);

        let global = monthly_series(&sample_records());
        assert_eq!(global.len(), 2);
    }

    #[test]
    fn ranking_breaks_ties_on_hours_then_id() {
        let records = vec![
            record("2025-01-06", "B", "X", dec!(8), dec!(4)),
            record("2025-01-06", "A", "X", dec!(8), dec!(4)),
            record("2025-01-06", "C", "X", dec!(10), dec!(5)),
            record("2025-01-06", "D", "X", dec!(4), dec!(4)),
        ];

        let ranked = top_technicians(&records, 10);
        let order: Vec<String> = ranked.iter().map(|a| a.scope.to_string()).collect();
        assert_eq!(order, vec!["D", "C", "A", "B"]);

        let top_two = top_technicians(&records, 2);
        assert_eq!(top_two.len(), 2);
    }

    #[test]
    fn rolling_window_includes_both_bounds() {
        let records = vec![
            record("2024-01-14", "T1", "X", dec!(8), dec!(0)),
            record("2024-01-15", "T1", "X", dec!(8), dec!(8)),
            record("2025-01-15", "T1", "X", dec!(8), dec!(4)),
            record("2025-01-16", "T1", "X", dec!(8), dec!(0)),
        ];

        let rolling = rolling_window(&records, d("2025-01-15"), 12, Grouping::Global).unwrap();

        assert_eq!(rolling[0].record_count, 2);
        assert_eq!(rolling[0].ratio, 0.75);
    }

    #[test]
    fn grouping_parses_from_cli_words() {
        assert_eq!("monthly".parse::<Grouping>(), Ok(Grouping::Month));
        assert_eq!("Technician".parse::<Grouping>(), Ok(Grouping::Technician));
        assert_eq!("team-month".parse::<Grouping>(), Ok(Grouping::TeamMonth));
        assert!("quarter".parse::<Grouping>().is_err());
    }

    #[test]
    fn technician_month_splits_each_technician_by_month() {
        let by_tech_month = aggregate(&sample_records(), Grouping::TechnicianMonth);

        assert_eq!(by_tech_month.len(), 5);
        assert_eq!(
            by_tech_month[0].scope,
            AggregateScope::TechnicianMonth {
                technician_id: "T1".to_string(),
                month: MonthKey { year: 2025, month: 1 },
            }
        );
        assert_eq!(by_tech_month[0].sum_hours_worked, dec!(16));
        assert_eq!(by_tech_month[0].ratio, 0.8125);

        let t2_feb = &by_tech_month[2];
        assert_eq!(t2_feb.scope.to_string(), "T2/2025-02");
        assert_eq!(t2_feb.ratio, 1.0);
    }

    #[test]
    fn technician_week_follows_iso_weeks() {
        let records = vec![
            record("2025-01-06", "T1", "X", dec!(8), dec!(8)),
            record("2025-01-10", "T1", "X", dec!(8), dec!(4)),
            record("2025-01-13", "T1", "X", dec!(8), dec!(0)),
            record("2025-01-13", "T2", "X", dec!(8), dec!(8)),
        ];

        let by_tech_week = aggregate(&records, Grouping::TechnicianWeek);

        assert_eq!(by_tech_week.len(), 3);
        assert_eq!(
            by_tech_week[0].scope,
            AggregateScope::TechnicianWeek {
                technician_id: "T1".to_string(),
                week: WeekKey { year: 2025, week: 2 },
            }
        );
        assert_eq!(by_tech_week[0].record_count, 2);
        assert_eq!(by_tech_week[0].ratio, 0.75);
        assert_eq!(by_tech_week[1].ratio, 0.0);
        assert_eq!(by_tech_week[2].scope.to_string(), "T2/2025-W03");
        assert_eq!(
            "technician-week".parse::<Grouping>(),
            Ok(Grouping::TechnicianWeek)
        );
    }

    #[test]
    fn sums_saturate_instead_of_overflowing() {
        let records = vec![
            record("2025-01-06", "T1", "X", Decimal::MAX, dec!(1)),
            record("2025-01-07", "T1", "X", Decimal::MAX, dec!(1)),
        ];

        let global = aggregate_global(&records);
        assert_eq!(global.sum_hours_worked, Decimal::MAX);

        let merged = global.merge(&global);
        assert_eq!(merged.sum_hours_worked, Decimal::MAX);
        assert_eq!(merged.record_count, 4);
    }

    #[test]
    fn distinct_teams_are_sorted() {
        assert_eq!(distinct_teams(&sample_records()), vec!["Atelier", "Terrain"]);
    }
}
