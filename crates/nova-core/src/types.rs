//! Shared data model used across more than one component.
//!
//! Component-local shapes (GST filings, utility bills, quiz questions, social
//! metrics, UPI rollups) live next to the component that owns them instead of
//! here, each module defining its own value types rather than centralising
//! everything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Financial-information categories a consent artefact may cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiType {
    Deposit,
    Upi,
    Gst,
    Utility,
    Social,
    TermDeposit,
    RecurringDeposit,
    MutualFunds,
    Sip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Active,
    Revoked,
    Paused,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataLifeUnit {
    Day,
    Month,
    Year,
    Inf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLife {
    pub unit: DataLifeUnit,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConsentPurpose {
    #[serde(default = "default_purpose_code")]
    pub code: String,
    #[serde(default = "default_purpose_text")]
    pub text: String,
}

fn default_purpose_code() -> String {
    "101".to_string()
}

fn default_purpose_text() -> String {
    "Credit assessment".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConsentFrequency {
    #[serde(default = "default_frequency_unit")]
    pub unit: String,
    #[serde(default = "default_frequency_value")]
    pub value: u32,
}

fn default_frequency_unit() -> String {
    "MONTH".to_string()
}

fn default_frequency_value() -> u32 {
    1
}

/// Consent artefact. Identified by `consent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentArtefact {
    pub consent_id: Uuid,
    pub user_reference_id: String,
    pub status: ConsentStatus,
    pub fi_types: Vec<FiType>,
    pub data_range: DataRange,
    pub data_life: DataLife,
    pub purpose: ConsentPurpose,
    pub frequency: ConsentFrequency,
    pub consent_artefact: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Input payload for `consent.create`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentRequest {
    pub user_reference_id: String,
    pub fi_types: Vec<FiType>,
    pub data_range: DataRange,
    pub data_life: DataLife,
    #[serde(default)]
    pub purpose: Option<ConsentPurpose>,
    #[serde(default)]
    pub frequency: Option<ConsentFrequency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FiSessionStatus {
    Pending,
    Ready,
    Failed,
}

/// FI session. Keyed by `txn_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiSession {
    pub txn_id: Uuid,
    pub session_id: String,
    pub consent_id: Uuid,
    pub fi_type: FiType,
    pub masked_account_number: Option<String>,
    pub status: FiSessionStatus,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub jws_signature: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnType {
    Credit,
    Debit,
}

/// Normalized transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub txn_id: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TxnType,
    pub mode: String,
    pub amount: f64,
    pub balance: f64,
    pub narration: String,
    pub reference: String,
    pub category: String,
}

/// Credit-tier bucket for a [`NovaScoreResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreTier {
    Prime,
    Good,
    #[serde(rename = "Sub-Prime")]
    SubPrime,
}

impl ScoreTier {
    pub fn from_score(score: u32) -> Self {
        if score >= 750 {
            ScoreTier::Prime
        } else if score >= 650 {
            ScoreTier::Good
        } else {
            ScoreTier::SubPrime
        }
    }
}

/// One SHAP-style feature attribution in a [`NovaScoreResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreExplanation {
    pub feature: String,
    pub impact: i32,
    pub reasoning: String,
}

/// NovaScore result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovaScoreResult {
    pub score: u32,
    pub tier: ScoreTier,
    pub confidence: f64,
    pub explanations: Vec<ScoreExplanation>,
    pub audit_hash: String,
}

/// A count+amount rollup keyed by an arbitrary label, reused by several analysers.
pub type CategoryBreakdown = BTreeMap<String, CategoryTotals>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CategoryTotals {
    pub count: u64,
    pub amount: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round_n(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
