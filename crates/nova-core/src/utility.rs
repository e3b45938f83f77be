//! Utility-bill reliability analyser: per-bill
//! classification, weighted reliability score, and trend detection.

use crate::types::round2;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    OnTime,
    MinorDelay,
    MajorDelay,
    Unpaid,
}

impl BillStatus {
    fn earned_points(self) -> u32 {
        match self {
            BillStatus::OnTime => 10,
            BillStatus::MinorDelay => 6,
            BillStatus::MajorDelay => 2,
            BillStatus::Unpaid => 0,
        }
    }
}

/// One utility bill as reported by BBPS.
#[derive(Debug, Clone, Deserialize)]
pub struct UtilityBill {
    pub category: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub marked_unpaid: bool,
}

pub fn classify_bill(bill: &UtilityBill) -> BillStatus {
    if bill.marked_unpaid || bill.paid_date.is_none() {
        return BillStatus::Unpaid;
    }
    let paid = bill.paid_date.unwrap();
    if paid <= bill.due_date {
        return BillStatus::OnTime;
    }
    let delay_days = (paid - bill.due_date).num_days();
    if delay_days <= 5 {
        BillStatus::MinorDelay
    } else {
        BillStatus::MajorDelay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CategoryRollup {
    pub total: u64,
    pub on_time: u64,
    pub minor_delay: u64,
    pub major_delay: u64,
    pub unpaid: u64,
    pub total_amount: f64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReliabilityReport {
    pub reliability_score: f64,
    pub consistency_score: u32,
    pub on_time: u64,
    pub minor_delays: u64,
    pub major_delays: u64,
    pub unpaid: u64,
    pub trend: Trend,
    pub breakdown: BTreeMap<String, CategoryRollup>,
}

/// Bills are assumed already sorted chronologically by the caller (BBPS
/// returns them in statement order); trend needs the last 3 vs. the mean.
pub fn analyze_utility(bills: &[UtilityBill]) -> ReliabilityReport {
    if bills.is_empty() {
        return ReliabilityReport {
            reliability_score: 0.0,
            consistency_score: 0,
            on_time: 0,
            minor_delays: 0,
            major_delays: 0,
            unpaid: 0,
            trend: Trend::Stable,
            breakdown: BTreeMap::new(),
        };
    }

    let mut on_time = 0u64;
    let mut minor_delays = 0u64;
    let mut major_delays = 0u64;
    let mut unpaid = 0u64;
    let mut earned_total = 0u32;
    let mut points_by_bill = Vec::with_capacity(bills.len());
    let mut breakdown: BTreeMap<String, CategoryRollup> = BTreeMap::new();

    for bill in bills {
        let status = classify_bill(bill);
        let points = status.earned_points();
        earned_total += points;
        points_by_bill.push(points);

        match status {
            BillStatus::OnTime => on_time += 1,
            BillStatus::MinorDelay => minor_delays += 1,
            BillStatus::MajorDelay => major_delays += 1,
            BillStatus::Unpaid => unpaid += 1,
        }

        let rollup = breakdown.entry(bill.category.clone()).or_default();
        rollup.total += 1;
        rollup.total_amount = round2(rollup.total_amount + bill.amount);
        match status {
            BillStatus::OnTime => rollup.on_time += 1,
            BillStatus::MinorDelay => rollup.minor_delay += 1,
            BillStatus::MajorDelay => rollup.major_delay += 1,
            BillStatus::Unpaid => rollup.unpaid += 1,
        }
    }

    for rollup in breakdown.values_mut() {
        let earned = rollup.on_time as f64 * 10.0 + rollup.minor_delay as f64 * 6.0 + rollup.major_delay as f64 * 2.0;
        rollup.weighted_score = round2(earned / (rollup.total as f64 * 10.0) * 100.0);
    }

    let total = bills.len() as u64;
    let reliability_score = round2(earned_total as f64 / (total as f64 * 10.0) * 100.0);
    let consistency_score = ((on_time as f64 / total as f64) * 100.0).round() as u32;

    let trend = if bills.len() < 4 {
        Trend::Stable
    } else {
        let overall_mean = earned_total as f64 / total as f64;
        let last_three = &points_by_bill[points_by_bill.len() - 3..];
        let recent_mean = last_three.iter().sum::<u32>() as f64 / 3.0;
        let delta = recent_mean - overall_mean;
        if delta > 1.0 {
            Trend::Improving
        } else if delta < -1.0 {
            Trend::Declining
        } else {
            Trend::Stable
        }
    };

    ReliabilityReport {
        reliability_score,
        consistency_score,
        on_time,
        minor_delays,
        major_delays,
        unpaid,
        trend,
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bill(category: &str, due: &str, paid: Option<&str>, unpaid: bool) -> UtilityBill {
        UtilityBill {
            category: category.to_string(),
            amount: 1000.0,
            due_date: date(due),
            paid_date: paid.map(date),
            marked_unpaid: unpaid,
        }
    }

    #[test]
    fn four_bills_one_each_status() {
        let bills = vec![
            bill("Electricity", "2025-01-10", Some("2025-01-10"), false),
            bill("Water", "2025-01-10", Some("2025-01-13"), false),
            bill("Gas", "2025-01-10", Some("2025-01-25"), false),
            bill("Broadband", "2025-01-10", None, true),
        ];
        let report = analyze_utility(&bills);
        assert_eq!(report.reliability_score, 45.0);
        assert_eq!(report.on_time, 1);
        assert_eq!(report.minor_delays, 1);
        assert_eq!(report.major_delays, 1);
        assert_eq!(report.unpaid, 1);
        assert_eq!(report.trend, Trend::Stable);
    }

    #[test]
    fn all_on_time_scores_100() {
        let bills: Vec<UtilityBill> = (0..4)
            .map(|_| bill("Electricity", "2025-01-10", Some("2025-01-05"), false))
            .collect();
        assert_eq!(analyze_utility(&bills).reliability_score, 100.0);
    }

    #[test]
    fn all_unpaid_scores_zero() {
        let bills: Vec<UtilityBill> = (0..4)
            .map(|_| bill("Electricity", "2025-01-10", None, true))
            .collect();
        assert_eq!(analyze_utility(&bills).reliability_score, 0.0);
    }

    #[test]
    fn fewer_than_four_bills_is_always_stable() {
        let bills = vec![
            bill("Electricity", "2025-01-10", Some("2025-01-05"), false),
            bill("Water", "2025-01-10", None, true),
        ];
        assert_eq!(analyze_utility(&bills).trend, Trend::Stable);
    }

    #[test]
    fn boundary_delay_of_five_days_is_minor() {
        let b = bill("Electricity", "2025-01-10", Some("2025-01-15"), false);
        assert_eq!(classify_bill(&b), BillStatus::MinorDelay);
        let b2 = bill("Electricity", "2025-01-10", Some("2025-01-16"), false);
        assert_eq!(classify_bill(&b2), BillStatus::MajorDelay);
    }
}
