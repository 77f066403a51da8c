// Listing Duration Pricing

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One purchasable listing duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    pub days: u32,
    /// Whole currency units (e.g. dollars)
    pub price: u32,
    pub description: String,
}

impl PricingTier {
    pub fn new(days: u32, price: u32, description: impl Into<String>) -> Self {
        Self {
            days,
            price,
            description: description.into(),
        }
    }

    /// Charge in minor units (cents), as payment providers expect
    pub fn amount_minor_units(&self) -> i64 {
        i64::from(self.price) * 100
    }

    /// Product name shown on the checkout page
    pub fn product_name(&self) -> String {
        format!("Job Posting - {} Days", self.days)
    }
}

/// Fixed set of duration tiers, keyed by days
#[derive(Debug, Clone)]
pub struct PricingTable {
    tiers: Vec<PricingTier>,
}

impl PricingTable {
    /// Build a table, rejecting empty sets, zero-day tiers and duplicate durations
    pub fn new(mut tiers: Vec<PricingTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(DomainError::Validation(
                "Pricing table needs at least one tier".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for tier in &tiers {
            if tier.days == 0 {
                return Err(DomainError::Validation(
                    "Pricing tier duration must be positive".to_string(),
                ));
            }
            if !seen.insert(tier.days) {
                return Err(DomainError::Validation(format!(
                    "Duplicate pricing tier for {} days",
                    tier.days
                )));
            }
        }

        tiers.sort_by_key(|t| t.days);
        Ok(Self { tiers })
    }

    pub fn lookup(&self, days: u32) -> Option<&PricingTier> {
        self.tiers.iter().find(|t| t.days == days)
    }

    /// Like `lookup`, failing with `InvalidDuration`
    pub fn require(&self, days: u32) -> Result<&PricingTier> {
        self.lookup(days).ok_or(DomainError::InvalidDuration(days))
    }

    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }
}

/// Built-in tiers
pub fn default_tiers() -> Vec<PricingTier> {
    vec![
        PricingTier::new(7, 29, "Short-term listing"),
        PricingTier::new(30, 99, "Standard listing"),
        PricingTier::new(60, 179, "Extended visibility"),
        PricingTier::new(90, 249, "Maximum exposure"),
    ]
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}
