//! UPI analytics: MCC inference, merchant diversity, and
//! monthly frequency rollups over UPI-mode transactions.

use crate::types::{round2, round_n, Transaction};
use std::collections::BTreeMap;

const MCC_PATTERNS: &[(&str, &str, u32)] = &[
    ("salary", "Salary", 6012),
    ("rent", "Rent", 6513),
    ("utility", "Utilities", 4900),
    ("grocer", "Groceries", 5411),
    ("fuel", "Fuel", 5541),
    ("telecom", "Telecom", 4812),
    ("insurance", "Insurance", 6300),
    ("healthcare", "Healthcare", 8062),
    ("shopping", "Shopping", 5311),
    ("food", "Food", 5812),
    ("transport", "Transport", 4121),
    ("professional", "Professional Services", 7392),
    ("loan", "Loan/EMI", 6010),
    ("emi", "Loan/EMI", 6010),
    ("investment", "Investment", 6211),
];

fn infer_mcc(narration: &str) -> (u32, String) {
    let lower = narration.to_lowercase();
    for (pattern, category, mcc) in MCC_PATTERNS {
        if lower.contains(pattern) {
            return (*mcc, category.to_string());
        }
    }
    (0, "Uncategorised".to_string())
}

#[derive(Debug, Clone, serde::Serialize, Default)]
pub struct MccRollup {
    pub mcc: u32,
    pub category: String,
    pub count: u64,
    pub volume: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TopMerchant {
    pub narration: String,
    pub count: u64,
    pub volume: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UpiAnalytics {
    pub transaction_count: u64,
    pub total_volume: f64,
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub avg_transaction_amt: f64,
    pub monthly_frequency: BTreeMap<String, u64>,
    pub mcc_rollup: Vec<MccRollup>,
    pub merchant_diversity_score: f64,
    pub top_merchants: Vec<TopMerchant>,
}

impl UpiAnalytics {
    /// `inflow/outflow`, used by the scoring façade; `None`
    /// when there has been no UPI outflow to divide by.
    pub fn inflow_outflow_ratio(&self) -> Option<f64> {
        if self.total_outflow == 0.0 {
            None
        } else {
            Some(self.total_inflow / self.total_outflow)
        }
    }
}

/// Normalised Shannon entropy over MCC categories.
fn diversity_score(mcc_counts: &BTreeMap<u32, u64>, total: u64) -> f64 {
    let n = mcc_counts.len();
    if n <= 1 || total == 0 {
        return 0.0;
    }
    let entropy: f64 = mcc_counts
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    round_n(entropy / (n as f64).ln(), 3)
}

/// Filters `transactions` to `mode = "UPI"` (case-insensitive) and computes
/// the full analytics bundle.
pub fn analyze_upi(transactions: &[Transaction]) -> UpiAnalytics {
    let upi: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.mode.eq_ignore_ascii_case("upi"))
        .collect();

    let transaction_count = upi.len() as u64;
    let total_volume = round2(upi.iter().map(|t| t.amount).sum());
    let total_inflow = round2(
        upi.iter()
            .filter(|t| t.kind == crate::types::TxnType::Credit)
            .map(|t| t.amount)
            .sum(),
    );
    let total_outflow = round2(
        upi.iter()
            .filter(|t| t.kind == crate::types::TxnType::Debit)
            .map(|t| t.amount)
            .sum(),
    );
    let avg_transaction_amt = if transaction_count == 0 {
        0.0
    } else {
        round2(total_volume / transaction_count as f64)
    };

    let mut monthly_frequency: BTreeMap<String, u64> = BTreeMap::new();
    let mut mcc_counts: BTreeMap<u32, u64> = BTreeMap::new();
    let mut mcc_rollups: BTreeMap<u32, MccRollup> = BTreeMap::new();
    let mut by_narration: BTreeMap<String, (u64, f64)> = BTreeMap::new();

    for txn in &upi {
        *monthly_frequency.entry(txn.date.format("%Y-%m").to_string()).or_insert(0) += 1;

        let (mcc, category) = infer_mcc(&txn.narration);
        *mcc_counts.entry(mcc).or_insert(0) += 1;
        let rollup = mcc_rollups.entry(mcc).or_insert_with(|| MccRollup {
            mcc,
            category: category.clone(),
            count: 0,
            volume: 0.0,
        });
        rollup.count += 1;
        rollup.volume = round2(rollup.volume + txn.amount);

        let entry = by_narration.entry(txn.narration.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 = round2(entry.1 + txn.amount);
    }

    let merchant_diversity_score = diversity_score(&mcc_counts, transaction_count);

    let mut top_merchants: Vec<TopMerchant> = by_narration
        .into_iter()
        .map(|(narration, (count, volume))| TopMerchant { narration, count, volume })
        .collect();
    top_merchants.sort_by(|a, b| b.volume.partial_cmp(&a.volume).unwrap());
    top_merchants.truncate(10);

    UpiAnalytics {
        transaction_count,
        total_volume,
        total_inflow,
        total_outflow,
        avg_transaction_amt,
        monthly_frequency,
        mcc_rollup: mcc_rollups.into_values().collect(),
        merchant_diversity_score,
        top_merchants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxnType;
    use chrono::Utc;

    fn txn(amount: f64, mode: &str, narration: &str) -> Transaction {
        Transaction {
            txn_id: uuid::Uuid::new_v4().to_string(),
            date: Utc::now(),
            kind: TxnType::Debit,
            mode: mode.to_string(),
            amount,
            balance: 0.0,
            narration: narration.to_string(),
            reference: String::new(),
            category: String::new(),
        }
    }

    #[test]
    fn upi_analytics_even_split_hits_max_diversity() {
        let transactions = vec![
            txn(10000.0, "UPI", "rent payment"),
            txn(1200.0, "UPI", "groceries order"),
            txn(50000.0, "UPI", "salary-credit reversal"),
            txn(20000.0, "NEFT", "rent payment"),
        ];
        let analytics = analyze_upi(&transactions);
        assert_eq!(analytics.transaction_count, 3);
        assert_eq!(analytics.total_volume, 61200.0);
        assert_eq!(analytics.merchant_diversity_score, 1.0);

        let mccs: Vec<u32> = analytics.mcc_rollup.iter().map(|r| r.mcc).collect();
        assert!(mccs.contains(&6513));
        assert!(mccs.contains(&5411));
        assert!(mccs.contains(&6012));
    }

    #[test]
    fn single_mcc_has_zero_diversity() {
        let transactions = vec![
            txn(100.0, "UPI", "rent payment one"),
            txn(200.0, "UPI", "rent payment two"),
        ];
        let analytics = analyze_upi(&transactions);
        assert_eq!(analytics.merchant_diversity_score, 0.0);
    }

    #[test]
    fn non_upi_transactions_are_excluded() {
        let transactions = vec![txn(500.0, "NEFT", "rent payment")];
        let analytics = analyze_upi(&transactions);
        assert_eq!(analytics.transaction_count, 0);
        assert_eq!(analytics.total_volume, 0.0);
    }

    #[test]
    fn intermediate_split_lies_strictly_between_bounds() {
        let transactions = vec![
            txn(100.0, "UPI", "rent payment"),
            txn(100.0, "UPI", "rent payment"),
            txn(100.0, "UPI", "rent payment"),
            txn(100.0, "UPI", "groceries order"),
        ];
        let analytics = analyze_upi(&transactions);
        assert!(analytics.merchant_diversity_score > 0.0 && analytics.merchant_diversity_score < 1.0);
    }
}
