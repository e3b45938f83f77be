//! Capability adapters for the credit intelligence engine: outbound HTTP,
//! SMS delivery, social-platform metadata, and consent persistence.

#![deny(unsafe_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nova_core::consent::ConsentRepository;
use nova_core::{ConsentArtefact, ConsentStatus, DataLife, DataLifeUnit, DataRange, FiType, Http, NovaError, PlatformFetcher, PlatformMetadata, SmsSender};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// `reqwest`-backed [`Http`] used against UIDAI, an AA, BBPS, or a GSP.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl Http for ReqwestHttp {
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, NovaError> {
        let mut request = self.client.post(url).timeout(timeout).json(&body);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))
    }

    async fn post_xml(&self, url: &str, body: String, timeout: Duration) -> Result<String, NovaError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<serde_json::Value, NovaError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| NovaError::UpstreamUnreachable(e.to_string()))
    }
}

/// Logs the message instead of delivering it. Real delivery is an operator
/// concern (DLT-registered SMS gateway) and out of scope here.
#[derive(Debug, Clone, Default)]
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send(&self, to_phone: &str, message: &str) -> Result<(), NovaError> {
        tracing::info!(to = %to_phone, %message, "sms: dispatched (logging sender)");
        Ok(())
    }
}

/// Deterministic sample metadata for one social platform, used in dev/test
/// in place of the platform's real OAuth-backed API.
#[derive(Debug, Clone)]
pub struct SamplePlatformFetcher {
    platform: &'static str,
}

impl SamplePlatformFetcher {
    pub fn new(platform: &'static str) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlatformFetcher for SamplePlatformFetcher {
    fn platform(&self) -> &'static str {
        self.platform
    }

    async fn fetch(&self, identifier: &str) -> Result<PlatformMetadata, NovaError> {
        // A stable, identifier-derived sample so repeated calls in a dev
        // session return the same numbers instead of random noise.
        let seed = identifier.bytes().map(u32::from).sum::<u32>() as f64;
        Ok(PlatformMetadata {
            network_size: (seed * 37.0) % 20_000.0,
            posts_last_6_months: (seed as u32 * 3) % 90,
            account_age_days: (seed as u32 * 11) % 3000 + 30,
            interaction_rate: (seed * 13.0) % 400.0,
        })
    }
}

const CONSENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS consent_log (
    consent_id UUID PRIMARY KEY,
    user_reference_id TEXT NOT NULL,
    status TEXT NOT NULL,
    fi_types JSONB NOT NULL,
    data_range JSONB NOT NULL,
    data_life JSONB NOT NULL,
    purpose JSONB NOT NULL,
    frequency JSONB NOT NULL,
    consent_artefact JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    revoked_at TIMESTAMPTZ NULL
)
"#;

/// PostgreSQL-backed [`ConsentRepository`] against the `consent_log` schema.
/// Callers that want a memory fallback when the pool is unreachable decide
/// that at the call site; this type always talks to Postgres or fails.
#[derive(Debug, Clone)]
pub struct PgConsentRepository {
    pool: PgPool,
}

impl PgConsentRepository {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, NovaError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| NovaError::Internal(format!("postgres connect failed: {e}")))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), NovaError> {
        sqlx::query(CONSENT_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| NovaError::Internal(format!("postgres schema create failed: {e}")))?;
        for index_sql in [
            "CREATE INDEX IF NOT EXISTS idx_consent_log_user_reference_id ON consent_log (user_reference_id)",
            "CREATE INDEX IF NOT EXISTS idx_consent_log_status ON consent_log (status)",
            "CREATE INDEX IF NOT EXISTS idx_consent_log_created_at ON consent_log (created_at)",
        ] {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| NovaError::Internal(format!("postgres index create failed: {e}")))?;
        }
        Ok(())
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<ConsentArtefact, NovaError> {
        let decode_json_err = |field: &str, e: sqlx::Error| {
            NovaError::Internal(format!("postgres decode {field} failed: {e}"))
        };

        let status_str: String = row
            .try_get("status")
            .map_err(|e| decode_json_err("status", e))?;
        let status = match status_str.as_str() {
            "ACTIVE" => ConsentStatus::Active,
            "REVOKED" => ConsentStatus::Revoked,
            "PAUSED" => ConsentStatus::Paused,
            _ => ConsentStatus::Expired,
        };

        Ok(ConsentArtefact {
            consent_id: row.try_get("consent_id").map_err(|e| decode_json_err("consent_id", e))?,
            user_reference_id: row
                .try_get("user_reference_id")
                .map_err(|e| decode_json_err("user_reference_id", e))?,
            status,
            fi_types: serde_json::from_value::<Vec<FiType>>(
                row.try_get("fi_types").map_err(|e| decode_json_err("fi_types", e))?,
            )
            .map_err(NovaError::from)?,
            data_range: serde_json::from_value::<DataRange>(
                row.try_get("data_range").map_err(|e| decode_json_err("data_range", e))?,
            )
            .map_err(NovaError::from)?,
            data_life: serde_json::from_value::<DataLife>(
                row.try_get("data_life").map_err(|e| decode_json_err("data_life", e))?,
            )
            .unwrap_or(DataLife { unit: DataLifeUnit::Month, value: 1 }),
            purpose: serde_json::from_value(
                row.try_get("purpose").map_err(|e| decode_json_err("purpose", e))?,
            )
            .unwrap_or_default(),
            frequency: serde_json::from_value(
                row.try_get("frequency").map_err(|e| decode_json_err("frequency", e))?,
            )
            .unwrap_or_default(),
            consent_artefact: row
                .try_get("consent_artefact")
                .map_err(|e| decode_json_err("consent_artefact", e))?,
            created_at: row.try_get("created_at").map_err(|e| decode_json_err("created_at", e))?,
            updated_at: row.try_get("updated_at").map_err(|e| decode_json_err("updated_at", e))?,
            revoked_at: row
                .try_get::<Option<DateTime<Utc>>, _>("revoked_at")
                .map_err(|e| decode_json_err("revoked_at", e))?,
        })
    }

    fn status_str(status: ConsentStatus) -> &'static str {
        match status {
            ConsentStatus::Active => "ACTIVE",
            ConsentStatus::Revoked => "REVOKED",
            ConsentStatus::Paused => "PAUSED",
            ConsentStatus::Expired => "EXPIRED",
        }
    }
}

#[async_trait]
impl ConsentRepository for PgConsentRepository {
    async fn insert(&self, artefact: &ConsentArtefact) -> Result<(), NovaError> {
        sqlx::query(
            r#"
            INSERT INTO consent_log (
                consent_id, user_reference_id, status, fi_types, data_range,
                data_life, purpose, frequency, consent_artefact, created_at, updated_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(artefact.consent_id)
        .bind(&artefact.user_reference_id)
        .bind(Self::status_str(artefact.status))
        .bind(serde_json::to_value(&artefact.fi_types).map_err(NovaError::from)?)
        .bind(serde_json::to_value(&artefact.data_range).map_err(NovaError::from)?)
        .bind(serde_json::to_value(&artefact.data_life).map_err(NovaError::from)?)
        .bind(serde_json::to_value(&artefact.purpose).map_err(NovaError::from)?)
        .bind(serde_json::to_value(&artefact.frequency).map_err(NovaError::from)?)
        .bind(&artefact.consent_artefact)
        .bind(artefact.created_at)
        .bind(artefact.updated_at)
        .bind(artefact.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| NovaError::Internal(format!("postgres insert failed: {e}")))?;
        Ok(())
    }

    async fn get(&self, consent_id: Uuid) -> Result<Option<ConsentArtefact>, NovaError> {
        let row = sqlx::query("SELECT * FROM consent_log WHERE consent_id = $1")
            .bind(consent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| NovaError::Internal(format!("postgres get failed: {e}")))?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn list_by_user(&self, user_reference_id: &str) -> Result<Vec<ConsentArtefact>, NovaError> {
        let rows = sqlx::query("SELECT * FROM consent_log WHERE user_reference_id = $1 ORDER BY created_at DESC")
            .bind(user_reference_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NovaError::Internal(format!("postgres list failed: {e}")))?;
        rows.iter().map(Self::decode_row).collect()
    }

    /// Row-level serialisability against concurrent `get` via a conditional
    /// `WHERE status='ACTIVE'`.
    async fn update(&self, artefact: &ConsentArtefact) -> Result<(), NovaError> {
        sqlx::query(
            r#"
            UPDATE consent_log
            SET status = $1, updated_at = $2, revoked_at = $3
            WHERE consent_id = $4 AND status = 'ACTIVE'
            "#,
        )
        .bind(Self::status_str(artefact.status))
        .bind(artefact.updated_at)
        .bind(artefact.revoked_at)
        .bind(artefact.consent_id)
        .execute(&self.pool)
        .await
        .map_err(|e| NovaError::Internal(format!("postgres update failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_platform_fetcher_is_deterministic_per_identifier() {
        let fetcher = SamplePlatformFetcher::new("linkedin");
        let a = fetcher.fetch("jane-doe").await.unwrap();
        let b = fetcher.fetch("jane-doe").await.unwrap();
        assert_eq!(a.network_size, b.network_size);
        assert_eq!(a.interaction_rate, b.interaction_rate);
    }

    #[tokio::test]
    async fn logging_sms_sender_never_fails() {
        let sender = LoggingSmsSender;
        assert!(sender.send("+910000000000", "hello").await.is_ok());
    }
}
