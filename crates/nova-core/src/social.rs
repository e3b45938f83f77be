//! Social metadata aggregator: URL validation, per-platform
//! fetch fan-out, and the weighted social score.

use crate::capabilities::{PlatformFetcher, PlatformMetadata};
use crate::error::NovaError;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use uuid::Uuid;

fn platform_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            ("linkedin", Regex::new(r"^https?://(www\.)?linkedin\.com/in/([A-Za-z0-9\-_%]+)/?$").unwrap()),
            ("twitter", Regex::new(r"^https?://(www\.)?(twitter|x)\.com/([A-Za-z0-9_]+)/?$").unwrap()),
            ("instagram", Regex::new(r"^https?://(www\.)?instagram\.com/([A-Za-z0-9_.]+)/?$").unwrap()),
            ("youtube", Regex::new(r"^https?://(www\.)?youtube\.com/(channel/|@)?([A-Za-z0-9_\-]+)/?$").unwrap()),
        ]
    })
}

#[derive(Debug, Clone)]
pub struct ValidatedProfile {
    pub platform: &'static str,
    pub identifier: String,
}

/// Validates each URL against the platform patterns, dropping invalid ones.
/// Requires at least one valid URL to remain.
pub fn validate_profile_urls(urls: &[String]) -> Result<Vec<ValidatedProfile>, NovaError> {
    let mut valid = Vec::new();
    for url in urls {
        let mut matched = false;
        for (platform, pattern) in platform_patterns() {
            if let Some(captures) = pattern.captures(url) {
                let identifier = captures
                    .iter()
                    .skip(1)
                    .filter_map(|c| c)
                    .last()
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                valid.push(ValidatedProfile { platform, identifier });
                matched = true;
                break;
            }
        }
        if !matched {
            tracing::warn!(%url, "social: dropping unrecognised or malformed profile url");
        }
    }
    if valid.is_empty() {
        return Err(NovaError::validation(
            "at least one valid profile url is required",
        ));
    }
    Ok(valid)
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn normalise(value: f64, min: f64, max: f64) -> f64 {
    clamp01((value - min) / (max - min))
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialScoreResult {
    pub session_id: Uuid,
    pub social_score: f64,
    pub platforms_used: Vec<&'static str>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Fetches every valid platform concurrently via its [`PlatformFetcher`] and
/// combines the result into one weighted score.
pub async fn compute_social_score(
    profiles: &[ValidatedProfile],
    fetchers: &[std::sync::Arc<dyn PlatformFetcher>],
) -> Result<SocialScoreResult, NovaError> {
    let mut metadatas: Vec<PlatformMetadata> = Vec::with_capacity(profiles.len());
    let mut platforms_used = Vec::with_capacity(profiles.len());

    for profile in profiles {
        let fetcher = fetchers
            .iter()
            .find(|f| f.platform() == profile.platform)
            .ok_or_else(|| NovaError::validation(format!("no fetcher configured for {}", profile.platform)))?;
        let metadata = fetcher.fetch(&profile.identifier).await?;
        platforms_used.push(profile.platform);
        metadatas.push(metadata);
    }

    let network = metadatas.iter().map(|m| m.network_size).fold(0.0, f64::max);
    let total_posts: u32 = metadatas.iter().map(|m| m.posts_last_6_months).sum();
    let post_frequency = total_posts as f64 / 6.0;
    let account_age_days = metadatas.iter().map(|m| m.account_age_days).max().unwrap_or(0) as f64;
    let interaction_rate = metadatas
        .iter()
        .map(|m| m.interaction_rate)
        .sum::<f64>()
        / metadatas.len().max(1) as f64;

    let social_score = crate::types::round_n(
        0.25 * normalise(network, 0.0, 50_000.0)
            + 0.25 * normalise(post_frequency, 0.0, 30.0)
            + 0.25 * normalise(account_age_days, 0.0, 3650.0)
            + 0.25 * normalise(interaction_rate, 0.0, 1000.0),
        4,
    );

    Ok(SocialScoreResult {
        session_id: Uuid::new_v4(),
        social_score,
        platforms_used,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedFetcher {
        platform: &'static str,
        metadata: PlatformMetadata,
    }

    #[async_trait]
    impl PlatformFetcher for FixedFetcher {
        fn platform(&self) -> &'static str {
            self.platform
        }

        async fn fetch(&self, _identifier: &str) -> Result<PlatformMetadata, NovaError> {
            Ok(self.metadata.clone())
        }
    }

    #[test]
    fn validates_and_extracts_identifiers() {
        let urls = vec![
            "https://www.linkedin.com/in/jane-doe".to_string(),
            "https://twitter.com/janedoe".to_string(),
            "not a url".to_string(),
        ];
        let valid = validate_profile_urls(&urls).unwrap();
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].platform, "linkedin");
        assert_eq!(valid[0].identifier, "jane-doe");
    }

    #[test]
    fn all_invalid_urls_is_rejected() {
        let urls = vec!["not a url".to_string()];
        assert!(validate_profile_urls(&urls).is_err());
    }

    #[tokio::test]
    async fn social_score_persists_only_session_score_and_platforms() {
        let profiles = vec![ValidatedProfile { platform: "linkedin", identifier: "jane".to_string() }];
        let fetchers: Vec<Arc<dyn PlatformFetcher>> = vec![Arc::new(FixedFetcher {
            platform: "linkedin",
            metadata: PlatformMetadata {
                network_size: 25_000.0,
                posts_last_6_months: 18,
                account_age_days: 1825,
                interaction_rate: 500.0,
            },
        })];
        let result = compute_social_score(&profiles, &fetchers).await.unwrap();
        assert_eq!(result.platforms_used, vec!["linkedin"]);
        assert!(result.social_score > 0.0 && result.social_score <= 1.0);
    }

    #[tokio::test]
    async fn missing_fetcher_for_platform_is_an_error() {
        let profiles = vec![ValidatedProfile { platform: "youtube", identifier: "x".to_string() }];
        let err = compute_social_score(&profiles, &[]).await.unwrap_err();
        assert!(matches!(err, NovaError::Validation { .. }));
    }
}
