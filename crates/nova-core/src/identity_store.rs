//! Rate-limited identity store (C3): per-identity failed-attempt counter with
//! lock-until timestamp, and the single OTP session per hashed identity.
//!
//! Keyed by the SHA-256 hex of the raw identifier. Backed by [`DashMap`] so
//! every mutator below is a single critical section per key without
//! a crate-wide mutex, matching the `DashMap`-per-registry shape used
//! throughout `maple-runtime`.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const MAX_ATTEMPTS: u32 = 3;
pub const LOCKOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default)]
struct AttemptRecord {
    failed_count: u32,
    locked_until: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct OtpSession {
    pub txn_id: Uuid,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct IncrementOutcome {
    pub locked: bool,
    pub attempts_left: u32,
}

/// In-process rate limiter and single-session map, one entry per hashed identity.
#[derive(Debug, Default)]
pub struct IdentityStore {
    attempts: DashMap<String, AttemptRecord>,
    sessions: DashMap<String, OtpSession>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            attempts: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Returns whether `hashed_id` is currently locked, opportunistically
    /// clearing an expired lock as a side effect.
    pub fn is_locked(&self, hashed_id: &str) -> bool {
        let mut expired = false;
        let locked = match self.attempts.get(hashed_id) {
            Some(record) => match record.locked_until {
                Some(until) if until > Instant::now() => true,
                Some(_) => {
                    expired = true;
                    false
                }
                None => false,
            },
            None => false,
        };
        if expired {
            if let Some(mut record) = self.attempts.get_mut(hashed_id) {
                record.locked_until = None;
                record.failed_count = 0;
            }
        }
        locked
    }

    pub fn remaining_lockout(&self, hashed_id: &str) -> u64 {
        self.attempts
            .get(hashed_id)
            .and_then(|record| record.locked_until)
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0)
    }

    /// Records a failed verify attempt. Crossing `MAX_ATTEMPTS` locks the identity.
    pub fn increment_failed(&self, hashed_id: &str) -> IncrementOutcome {
        let mut record = self.attempts.entry(hashed_id.to_string()).or_default();
        record.failed_count += 1;
        let locked = record.failed_count >= MAX_ATTEMPTS;
        if locked {
            record.locked_until = Some(Instant::now() + LOCKOUT);
        }
        IncrementOutcome {
            locked,
            attempts_left: MAX_ATTEMPTS.saturating_sub(record.failed_count),
        }
    }

    /// Clears failures on a successful verify.
    pub fn reset(&self, hashed_id: &str) {
        self.attempts.remove(hashed_id);
    }

    pub fn put_session(&self, hashed_id: &str, txn_id: Uuid) {
        self.sessions.insert(
            hashed_id.to_string(),
            OtpSession {
                txn_id,
                created_at: Instant::now(),
            },
        );
    }

    pub fn get_session(&self, hashed_id: &str) -> Option<OtpSession> {
        self.sessions.get(hashed_id).map(|s| s.clone())
    }

    pub fn clear_session(&self, hashed_id: &str) {
        self.sessions.remove(hashed_id);
    }
}
