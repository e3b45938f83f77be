//! Narrow capability contracts the core depends on instead of constructing
//! its own I/O. `nova-adapters` supplies concrete and mock implementations;
//! tests inject fakes.

use crate::error::NovaError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Outbound HTTP, the only way `nova-core` talks to UIDAI, an AA, BBPS, or a GSP.
#[async_trait]
pub trait Http: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Value,
        timeout: Duration,
    ) -> Result<Value, NovaError>;

    async fn post_xml(
        &self,
        url: &str,
        body: String,
        timeout: Duration,
    ) -> Result<String, NovaError>;

    async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Value, NovaError>;
}

/// One-method SMS delivery contract, treated as a plug-in so a real gateway integration never touches core logic.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to_phone: &str, message: &str) -> Result<(), NovaError>;
}

/// A single connected social platform's raw metadata, before scoring (C13).
#[derive(Debug, Clone)]
pub struct PlatformMetadata {
    pub network_size: f64,
    pub posts_last_6_months: u32,
    pub account_age_days: u32,
    pub interaction_rate: f64,
}

/// Capability over one social platform: OAuth-backed or a headless scraper,
/// the aggregator never knows which.
#[async_trait]
pub trait PlatformFetcher: Send + Sync {
    fn platform(&self) -> &'static str;

    async fn fetch(&self, identifier: &str) -> Result<PlatformMetadata, NovaError>;
}
