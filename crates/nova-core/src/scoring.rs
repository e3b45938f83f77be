//! NovaScore aggregation façade: combines analyser outputs
//! into one clamped, explained, tamper-evident score.

use crate::crypto::sha256_hex;
use crate::types::{NovaScoreResult, ScoreExplanation, ScoreTier};
use crate::upi::UpiAnalytics;
use chrono::Utc;
use serde_json::json;

const BASE_SCORE: i32 = 750;
const MIN_SCORE: u32 = 300;
const MAX_SCORE: u32 = 900;

/// Inputs the façade combines; each is optional because a caller may only
/// have run a subset of the analysers so far.
#[derive(Debug, Clone, Default)]
pub struct ScoringInputs {
    pub upi: Option<UpiAnalytics>,
    pub network_strength: Option<f64>,
    pub turnover_variance_pct: Option<f64>,
}

fn inputs_digest(inputs: &ScoringInputs) -> String {
    let payload = json!({
        "upi_inflow_outflow": inputs.upi.as_ref().map(|u| u.total_volume),
        "network_strength": inputs.network_strength,
        "turnover_variance_pct": inputs.turnover_variance_pct,
    });
    sha256_hex(serde_json::to_vec(&payload).unwrap_or_default())
}

pub fn compute_score(inputs: &ScoringInputs) -> NovaScoreResult {
    let mut score = BASE_SCORE;
    let mut explanations = Vec::new();

    let inflow_outflow_ratio = inputs.upi.as_ref().and_then(UpiAnalytics::inflow_outflow_ratio);

    let upi_bonus = match inflow_outflow_ratio {
        Some(ratio) if ratio >= 1.2 => {
            explanations.push(ScoreExplanation {
                feature: "upi_inflow_outflow_ratio".to_string(),
                impact: 40,
                reasoning: "inflow/outflow ratio at or above 1.2".to_string(),
            });
            40
        }
        _ => {
            explanations.push(ScoreExplanation {
                feature: "upi_inflow_outflow_ratio".to_string(),
                impact: 10,
                reasoning: "inflow/outflow ratio below 1.2 or unavailable".to_string(),
            });
            10
        }
    };
    score += upi_bonus;

    if let Some(strength) = inputs.network_strength {
        if strength > 0.8 {
            score += 30;
            explanations.push(ScoreExplanation {
                feature: "network_strength".to_string(),
                impact: 30,
                reasoning: "validation-derived network strength above 0.8".to_string(),
            });
        }
    }

    if let Some(variance) = inputs.turnover_variance_pct {
        if variance > 15.0 {
            score -= 50;
            explanations.push(ScoreExplanation {
                feature: "turnover_variance".to_string(),
                impact: -50,
                reasoning: "GST/bank turnover variance above 15%".to_string(),
            });
        }
    }

    let clamped = score.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u32;
    let tier = ScoreTier::from_score(clamped);

    let timestamp_ms = Utc::now().timestamp_millis();
    let digest = inputs_digest(inputs);
    let audit_payload = json!({
        "score": clamped,
        "inputs_digest": digest,
        "timestamp_ms": timestamp_ms,
    });
    let audit_hash = sha256_hex(serde_json::to_vec(&audit_payload).unwrap_or_default());

    NovaScoreResult {
        score: clamped,
        tier,
        confidence: if explanations.len() >= 3 { 0.9 } else { 0.6 },
        explanations,
        audit_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upi::analyze_upi;
    use crate::types::{Transaction, TxnType};
    use chrono::Utc;

    fn upi_txn(kind: TxnType, amount: f64) -> Transaction {
        Transaction {
            txn_id: uuid::Uuid::new_v4().to_string(),
            date: Utc::now(),
            kind,
            mode: "UPI".to_string(),
            amount,
            balance: 0.0,
            narration: "groceries".to_string(),
            reference: String::new(),
            category: String::new(),
        }
    }

    #[test]
    fn base_score_with_no_inputs_is_760() {
        let result = compute_score(&ScoringInputs::default());
        assert_eq!(result.score, 760);
        assert_eq!(result.tier, ScoreTier::Prime);
    }

    #[test]
    fn network_strength_bonus_applies_above_threshold() {
        let inputs = ScoringInputs { network_strength: Some(0.9), ..Default::default() };
        let result = compute_score(&inputs);
        assert_eq!(result.score, 790);
    }

    #[test]
    fn turnover_variance_penalty_applies_above_threshold() {
        let inputs = ScoringInputs { turnover_variance_pct: Some(20.0), ..Default::default() };
        let result = compute_score(&inputs);
        assert_eq!(result.score, 710);
    }

    #[test]
    fn score_clamps_to_band() {
        let inputs = ScoringInputs { turnover_variance_pct: Some(99.0), ..Default::default() };
        let result = compute_score(&inputs);
        assert!(result.score >= 300);
    }

    #[test]
    fn strong_upi_inflow_outflow_ratio_earns_the_larger_bonus() {
        let upi = analyze_upi(&[
            upi_txn(TxnType::Credit, 12_000.0),
            upi_txn(TxnType::Debit, 10_000.0),
        ]);
        assert!(upi.inflow_outflow_ratio().unwrap() >= 1.2);
        let inputs = ScoringInputs { upi: Some(upi), ..Default::default() };
        let result = compute_score(&inputs);
        assert_eq!(result.score, 790);
    }

    #[test]
    fn weak_upi_inflow_outflow_ratio_earns_the_smaller_bonus() {
        let upi = analyze_upi(&[
            upi_txn(TxnType::Credit, 5_000.0),
            upi_txn(TxnType::Debit, 10_000.0),
        ]);
        let inputs = ScoringInputs { upi: Some(upi), ..Default::default() };
        let result = compute_score(&inputs);
        assert_eq!(result.score, 760);
    }

    #[test]
    fn audit_hash_is_a_64_char_hex_digest() {
        let result = compute_score(&ScoringInputs::default());
        assert_eq!(result.audit_hash.len(), 64);
    }
}
