//! GST compliance analyser: due-date classification and
//! per-return-type compliance rollups.

use crate::error::NovaError;
use crate::types::round_n;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn gstin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}[A-Z]{5}\d{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").unwrap())
}

pub fn validate_gstin(gstin: &str) -> Result<(), NovaError> {
    if gstin_re().is_match(gstin) {
        Ok(())
    } else {
        Err(NovaError::validation("gstin does not match the expected format"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnType {
    #[serde(rename = "GSTR-1")]
    Gstr1,
    #[serde(rename = "GSTR-3B")]
    Gstr3B,
}

impl ReturnType {
    fn due_day(self) -> u32 {
        match self {
            ReturnType::Gstr1 => 11,
            ReturnType::Gstr3B => 20,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ReturnType::Gstr1 => "GSTR-1",
            ReturnType::Gstr3B => "GSTR-3B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilingStatus {
    OnTime,
    Delayed,
}

/// One filing record as reported by the upstream GSP.
#[derive(Debug, Clone, Deserialize)]
pub struct GstFiling {
    pub return_type: ReturnType,
    /// First day of the filing period, e.g. 2025-06-01 for a June 2025 return.
    pub period_start: NaiveDate,
    pub filed_at: DateTime<Utc>,
    pub turnover: f64,
    pub tax_paid: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedFiling {
    pub return_type: &'static str,
    pub status: FilingStatus,
    pub delay_days: i64,
}

/// Due date for the period starting at `period_start` is day `due_day` of
/// the *following* month, 23:59:59 local. No QRMP quarterly variant.
fn due_date(return_type: ReturnType, period_start: NaiveDate) -> DateTime<Utc> {
    let next_month_start = if period_start.month() == 12 {
        NaiveDate::from_ymd_opt(period_start.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(period_start.year(), period_start.month() + 1, 1).unwrap()
    };
    let due_date = next_month_start
        .with_day(return_type.due_day())
        .unwrap_or(next_month_start);
    Utc.from_utc_datetime(&due_date.and_hms_opt(23, 59, 59).unwrap())
}

pub fn classify_filing(filing: &GstFiling) -> ClassifiedFiling {
    let due = due_date(filing.return_type, filing.period_start);
    if filing.filed_at <= due {
        ClassifiedFiling {
            return_type: filing.return_type.label(),
            status: FilingStatus::OnTime,
            delay_days: 0,
        }
    } else {
        let delay_seconds = (filing.filed_at - due).num_seconds();
        let delay_days = (delay_seconds + 86_399) / 86_400;
        ClassifiedFiling {
            return_type: filing.return_type.label(),
            status: FilingStatus::Delayed,
            delay_days: delay_days.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReturnTypeRollup {
    pub total: u64,
    pub on_time: u64,
    pub delayed: u64,
    pub total_turnover: f64,
    pub total_tax_paid: f64,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub compliance_score: f64,
    pub avg_turnover: f64,
    pub breakdown: BTreeMap<String, ReturnTypeRollup>,
    pub filings: Vec<ClassifiedFiling>,
}

pub fn analyze_gst(filings: &[GstFiling]) -> ComplianceReport {
    let mut breakdown: BTreeMap<String, ReturnTypeRollup> = BTreeMap::new();
    let mut classified = Vec::with_capacity(filings.len());
    let mut total_on_time = 0u64;
    let mut turnover_sum = 0.0;

    for filing in filings {
        let result = classify_filing(filing);
        let rollup = breakdown.entry(result.return_type.to_string()).or_default();
        rollup.total += 1;
        rollup.total_turnover = round_n(rollup.total_turnover + filing.turnover, 2);
        rollup.total_tax_paid = round_n(rollup.total_tax_paid + filing.tax_paid, 2);
        match result.status {
            FilingStatus::OnTime => {
                rollup.on_time += 1;
                total_on_time += 1;
            }
            FilingStatus::Delayed => rollup.delayed += 1,
        }
        turnover_sum += filing.turnover;
        classified.push(result);
    }

    for rollup in breakdown.values_mut() {
        rollup.compliance_rate = if rollup.total == 0 {
            0.0
        } else {
            round_n(rollup.on_time as f64 / rollup.total as f64, 4)
        };
    }

    let compliance_score = if filings.is_empty() {
        0.0
    } else {
        round_n(total_on_time as f64 / filings.len() as f64, 4)
    };
    let avg_turnover = if filings.is_empty() {
        0.0
    } else {
        round_n(turnover_sum / filings.len() as f64, 2)
    };

    ComplianceReport {
        compliance_score,
        avg_turnover,
        breakdown,
        filings: classified,
    }
}
