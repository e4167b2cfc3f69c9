//! Usage limits per site tier.

use serde::Serialize;

use crate::enums::{SiteTier, SourceKind};
use crate::errors::CoreError;

const BASIC_SOURCES: &[SourceKind] = &[SourceKind::Technical, SourceKind::Performance];
const NO_AI_SOURCES: &[SourceKind] = &[
    SourceKind::Technical,
    SourceKind::Ranking,
    SourceKind::Performance,
];

/// Limits applied to every audit request for a site of a given tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    /// Sources the tier may request.
    pub allowed_sources: &'static [SourceKind],
    /// Maximum keyword positions kept from a ranking snapshot. `None` = unlimited.
    pub max_keywords: Option<usize>,
    /// Maximum audits per rolling 24 hours. `None` = unlimited.
    pub audits_per_day: Option<u32>,
}

impl SiteTier {
    #[must_use]
    pub const fn limits(self) -> TierLimits {
        match self {
            Self::Demo => TierLimits {
                allowed_sources: BASIC_SOURCES,
                max_keywords: Some(10),
                audits_per_day: Some(1),
            },
            Self::Starter => TierLimits {
                allowed_sources: NO_AI_SOURCES,
                max_keywords: Some(100),
                audits_per_day: Some(4),
            },
            Self::Pro => TierLimits {
                allowed_sources: &SourceKind::ALL,
                max_keywords: Some(500),
                audits_per_day: Some(12),
            },
            Self::Enterprise => TierLimits {
                allowed_sources: &SourceKind::ALL,
                max_keywords: Some(2000),
                audits_per_day: Some(48),
            },
            Self::Agency => TierLimits {
                allowed_sources: &SourceKind::ALL,
                max_keywords: Some(5000),
                audits_per_day: Some(96),
            },
            Self::Internal => TierLimits {
                allowed_sources: &SourceKind::ALL,
                max_keywords: None,
                audits_per_day: None,
            },
        }
    }
}

impl TierLimits {
    /// Reject sources the tier does not include.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` naming the first disallowed source.
    pub fn check_sources(&self, tier: SiteTier, sources: &[SourceKind]) -> Result<(), CoreError> {
        match sources.iter().find(|s| !self.allowed_sources.contains(s)) {
            Some(source) => Err(CoreError::Validation(format!(
                "source '{source}' is not available on the {tier} tier"
            ))),
            None => Ok(()),
        }
    }

    /// Reject a new audit when `audits_last_day` already reached the cap.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when the daily cap is exhausted.
    pub fn check_frequency(&self, tier: SiteTier, audits_last_day: u32) -> Result<(), CoreError> {
        match self.audits_per_day {
            Some(cap) if audits_last_day >= cap => Err(CoreError::Validation(format!(
                "the {tier} tier allows {cap} audit(s) per 24 hours"
            ))),
            _ => Ok(()),
        }
    }
}
