//! Transaction parser and analytics. Tolerates five distinct
//! upstream response shapes; all funnel into one normaliser.

use crate::error::NovaError;
use crate::types::{round2, CategoryBreakdown, CategoryTotals, Transaction, TxnType};
use serde_json::Value;
use std::collections::BTreeMap;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Salary", &["salary", "payroll", "wages"]),
    ("Rent", &["rent", "lease"]),
    ("Utilities", &["electricity", "water bill", "gas bill", "utility", "utilities", "broadband"]),
    ("EMI", &["emi", "loan installment", "loan repayment"]),
    ("Investment", &["mutual fund", "sip", "stocks", "investment", "nps"]),
    ("Shopping", &["amazon", "flipkart", "shopping", "mall"]),
    ("Food", &["swiggy", "zomato", "restaurant", "food", "groceries", "grocery"]),
    ("Travel", &["uber", "ola", "irctc", "flight", "travel", "fuel"]),
    ("UPI_Transfer", &["upi", "imps", "neft transfer to"]),
];

/// One of the five shapes tolerated, dispatched once up front so the
/// normaliser has a single iterator to walk.
fn raw_records(input: &Value) -> Result<Vec<Value>, NovaError> {
    if let Some(array) = input.as_array() {
        return Ok(array.clone());
    }
    if let Some(nested) = input.pointer("/Account/Transactions/Transaction") {
        return Ok(match nested {
            Value::Array(items) => items.clone(),
            single => vec![single.clone()],
        });
    }
    for key in ["Transactions", "transactions", "data"] {
        if let Some(value) = input.get(key) {
            return Ok(match value {
                Value::Array(items) => items.clone(),
                single => vec![single.clone()],
            });
        }
    }
    if input.is_object() {
        return Ok(vec![input.clone()]);
    }
    Err(NovaError::validation(
        "transactions payload did not match any recognised shape",
    ))
}

fn as_non_negative_f64(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_nan() || parsed < 0.0 {
        0.0
    } else {
        parsed
    }
}

fn as_str(value: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(s) = value.get(key).and_then(Value::as_str) {
            return s.to_string();
        }
    }
    String::new()
}

fn detect_type(record: &Value, narration: &str) -> TxnType {
    let explicit = as_str(record, &["type", "Type", "TYPE"]).to_uppercase();
    match explicit.as_str() {
        "CREDIT" | "CR" | "C" => return TxnType::Credit,
        "DEBIT" | "DR" | "D" => return TxnType::Debit,
        _ => {}
    }
    let lower = narration.to_lowercase();
    if lower.contains("credit") || lower.contains("received") || lower.contains("deposit") {
        TxnType::Credit
    } else {
        TxnType::Debit
    }
}

fn infer_category(narration: &str) -> String {
    let lower = narration.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return category.to_string();
        }
    }
    "Misc".to_string()
}

fn normalise(record: &Value) -> Transaction {
    let narration = as_str(record, &["narration", "Narration", "description", "remarks"]);
    let date = as_str(record, &["date", "Date", "txnDate", "valueDate"]);
    let parsed_date = chrono::DateTime::parse_from_rfc3339(&date)
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Transaction {
        txn_id: {
            let id = as_str(record, &["txnId", "id", "transactionId"]);
            if id.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                id
            }
        },
        date: parsed_date,
        kind: detect_type(record, &narration),
        mode: as_str(record, &["mode", "Mode", "channel"]),
        amount: round2(as_non_negative_f64(record.get("amount").or_else(|| record.get("Amount")))),
        balance: round2(as_non_negative_f64(record.get("balance").or_else(|| record.get("Balance")))),
        category: infer_category(&narration),
        reference: as_str(record, &["reference", "Reference", "refId"]),
        narration,
    }
}

/// Recurring-payment group keyed by `amount || narration[0..10]`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecurringGroup {
    pub key: String,
    pub count: usize,
    pub amount: f64,
    pub cadence: &'static str,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionAnalysis {
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub net_flow: f64,
    pub credit_count: usize,
    pub debit_count: usize,
    pub savings_rate: f64,
    pub category_breakdown: CategoryBreakdown,
    pub recurring_payments: Vec<RecurringGroup>,
    pub sample_credits: Vec<Transaction>,
    pub sample_debits: Vec<Transaction>,
}

fn recurring_key(txn: &Transaction) -> String {
    let prefix: String = txn.narration.chars().take(10).collect();
    format!("{:.2}|{}", txn.amount, prefix)
}

/// Parses any of the five tolerated shapes into normalised transactions,
/// without running the analytics pass. Shared by `upi.analyse`, which needs
/// the same shape tolerance ahead of its own, narrower rollups.
pub fn normalise_all(input: &Value) -> Result<Vec<Transaction>, NovaError> {
    let records = raw_records(input)?;
    Ok(records.iter().map(normalise).collect())
}

/// Parses any of the tolerated shapes and returns the analytics in one pass.
pub fn analyze_transactions(input: &Value) -> Result<TransactionAnalysis, NovaError> {
    let transactions = normalise_all(input)?;

    let mut total_inflow = 0.0;
    let mut total_outflow = 0.0;
    let mut credit_count = 0usize;
    let mut debit_count = 0usize;
    let mut breakdown: CategoryBreakdown = BTreeMap::new();
    let mut debit_groups: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();

    for txn in &transactions {
        match txn.kind {
            TxnType::Credit => {
                total_inflow += txn.amount;
                credit_count += 1;
            }
            TxnType::Debit => {
                total_outflow += txn.amount;
                debit_count += 1;
                debit_groups.entry(recurring_key(txn)).or_default().push(txn);
            }
        }
        let entry = breakdown.entry(txn.category.clone()).or_insert_with(CategoryTotals::default);
        entry.count += 1;
        entry.amount = round2(entry.amount + txn.amount);
    }

    total_inflow = round2(total_inflow);
    total_outflow = round2(total_outflow);
    let net_flow = round2(total_inflow - total_outflow);
    let savings_rate = if total_inflow == 0.0 {
        0.0
    } else {
        round2(net_flow / total_inflow)
    };

    let mut recurring_payments: Vec<RecurringGroup> = debit_groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(key, group)| RecurringGroup {
            count: group.len(),
            amount: group[0].amount,
            cadence: if group.len() > 5 { "Weekly/Biweekly" } else { "Monthly" },
            key,
        })
        .collect();
    recurring_payments.truncate(5);

    let sample_credits = transactions
        .iter()
        .filter(|t| t.kind == TxnType::Credit)
        .take(50)
        .cloned()
        .collect();
    let sample_debits = transactions
        .iter()
        .filter(|t| t.kind == TxnType::Debit)
        .take(50)
        .cloned()
        .collect();

    Ok(TransactionAnalysis {
        total_inflow,
        total_outflow,
        net_flow,
        credit_count,
        debit_count,
        savings_rate,
        category_breakdown: breakdown,
        recurring_payments,
        sample_credits,
        sample_debits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_records() -> Value {
        json!([
            { "txnId": "t1", "date": "2025-06-01T00:00:00Z", "type": "CREDIT", "amount": 50000, "balance": 50000, "narration": "Salary credit June" },
            { "txnId": "t2", "date": "2025-06-02T00:00:00Z", "type": "DEBIT", "amount": 15000, "balance": 35000, "narration": "Rent payment" },
            { "txnId": "t3", "date": "2025-07-02T00:00:00Z", "type": "DEBIT", "amount": 15000, "balance": 20000, "narration": "Rent payment" },
        ])
    }

    #[test]
    fn parser_shape_tolerance_produces_identical_totals() {
        let shapes = vec![
            sample_records(),
            json!({ "Transactions": sample_records() }),
            json!({ "transactions": sample_records() }),
            json!({ "data": sample_records() }),
            json!({ "Account": { "Transactions": { "Transaction": sample_records() } } }),
        ];
        let baseline = analyze_transactions(&shapes[0]).unwrap();
        for shape in &shapes[1..] {
            let analysis = analyze_transactions(shape).unwrap();
            assert_eq!(analysis.total_inflow, baseline.total_inflow);
            assert_eq!(analysis.total_outflow, baseline.total_outflow);
            assert_eq!(analysis.net_flow, baseline.net_flow);
            assert_eq!(analysis.credit_count, baseline.credit_count);
            assert_eq!(analysis.debit_count, baseline.debit_count);
        }
    }

    #[test]
    fn single_object_shape_is_accepted() {
        let record = json!({ "txnId": "t1", "type": "CREDIT", "amount": 100, "balance": 100, "narration": "deposit" });
        let analysis = analyze_transactions(&record).unwrap();
        assert_eq!(analysis.credit_count, 1);
    }

    #[test]
    fn recurring_rent_payments_are_grouped() {
        let analysis = analyze_transactions(&sample_records()).unwrap();
        assert_eq!(analysis.recurring_payments.len(), 1);
        assert_eq!(analysis.recurring_payments[0].count, 2);
        assert_eq!(analysis.recurring_payments[0].cadence, "Monthly");
    }

    #[test]
    fn narration_keyword_detects_credit_without_explicit_type() {
        let record = json!({ "txnId": "t1", "amount": 100, "balance": 100, "narration": "deposit received" });
        let analysis = analyze_transactions(&record).unwrap();
        assert_eq!(analysis.credit_count, 1);
        assert_eq!(analysis.debit_count, 0);
    }

    #[test]
    fn savings_rate_is_zero_when_no_inflow() {
        let record = json!([{ "txnId": "t1", "type": "DEBIT", "amount": 500, "balance": 0, "narration": "shopping" }]);
        let analysis = analyze_transactions(&record).unwrap();
        assert_eq!(analysis.savings_rate, 0.0);
    }

    #[test]
    fn unrecognised_shape_is_rejected() {
        assert!(analyze_transactions(&json!("not an object or array")).is_err());
    }
}
