//! Credit intelligence core: Aadhaar OTP identity, Account Aggregator
//! consent and fetch pipeline, and the analysers that feed the NovaScore
//! aggregation façade.
//!
//! No network, database, or SMS I/O lives in this crate. It depends on the
//! [`Http`], [`SmsSender`], and [`PlatformFetcher`] capability traits and on
//! [`consent::ConsentRepository`], all of which `nova-adapters` implements.

#![deny(unsafe_code)]

pub mod aa;
pub mod aadhaar;
pub mod capabilities;
pub mod config;
pub mod consent;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod gst;
pub mod identity_store;
pub mod jws;
pub mod quiz;
pub mod scoring;
pub mod social;
pub mod transactions;
pub mod types;
pub mod upi;
pub mod utility;

pub use aa::{AaEngine, FiFetchInput, FiFetchResult, FiRequestInput, FiRequestResult};
pub use aadhaar::{AadhaarEngine, InitiateResult, VerifyResult};
pub use capabilities::{Http, PlatformFetcher, PlatformMetadata, SmsSender};
pub use config::CoreConfig;
pub use consent::{ConsentRepository, ConsentStore, MemoryConsentRepository};
pub use crypto::{CryptoError, Sealed};
pub use error::{FieldError, NovaError};
pub use gst::{analyze_gst, classify_filing, validate_gstin, ComplianceReport, GstFiling, ReturnType};
pub use identity_store::IdentityStore;
pub use quiz::{issue_quiz, score_quiz, IssuedQuiz, QuizQuestion, QuizResponse, ScoredQuiz};
pub use scoring::{compute_score, ScoringInputs};
pub use social::{compute_social_score, validate_profile_urls, SocialScoreResult, ValidatedProfile};
pub use transactions::{analyze_transactions, normalise_all, RecurringGroup, TransactionAnalysis};
pub use types::{
    ConsentArtefact, ConsentFrequency, ConsentPurpose, ConsentRequest, ConsentStatus, DataLife,
    DataLifeUnit, DataRange, FiSession, FiSessionStatus, FiType, NovaScoreResult, ScoreExplanation,
    ScoreTier, Transaction, TxnType,
};
pub use upi::{analyze_upi, UpiAnalytics};
pub use utility::{analyze_utility, classify_bill, BillStatus, ReliabilityReport, Trend, UtilityBill};
