//! Credit packages and plan tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Credits consumed by one character generation.
pub const GENERATION_COST: i32 = 1;

/// Default credits granted to a brand-new user row.
pub const DEFAULT_INITIAL_CREDITS: i32 = 1;

/// Ledger reasons (the `credit_ledger.reason` column).
pub mod reasons {
    pub const SIGNUP_GRANT: &str = "signup_grant";
    pub const GENERATION: &str = "generation";
    pub const PURCHASE: &str = "purchase";
    pub const CLAIM: &str = "claim";
}

// ---------------------------------------------------------------------------
// PlanTier
// ---------------------------------------------------------------------------

/// Plan tier stored on the user row. Ordered: a purchase only ever raises it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Starter,
    Popular,
    Pro,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Popular => "popular",
            PlanTier::Pro => "pro",
        }
    }

    /// Parse a stored tier, treating unknown values as `Free`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "starter" => PlanTier::Starter,
            "popular" => PlanTier::Popular,
            "pro" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    /// Tier after buying `package` while on `self`.
    pub fn upgraded_by(self, package: CreditPackage) -> Self {
        self.max(package.tier())
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CreditPackage
// ---------------------------------------------------------------------------

/// A purchasable bundle of credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPackage {
    Starter,
    Popular,
    Pro,
}

/// Serializable description of a package for the pricing page.
#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub id: CreditPackage,
    pub name: &'static str,
    pub credits: i32,
    pub price_cents: i64,
    pub currency: &'static str,
}

impl CreditPackage {
    pub const ALL: [CreditPackage; 3] = [
        CreditPackage::Starter,
        CreditPackage::Popular,
        CreditPackage::Pro,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CreditPackage::Starter => "starter",
            CreditPackage::Popular => "popular",
            CreditPackage::Pro => "pro",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CreditPackage::Starter => "Starter Roast Pack",
            CreditPackage::Popular => "Popular Roast Pack",
            CreditPackage::Pro => "Pro Roast Pack",
        }
    }

    pub fn credits(self) -> i32 {
        match self {
            CreditPackage::Starter => 5,
            CreditPackage::Popular => 15,
            CreditPackage::Pro => 50,
        }
    }

    /// Price in US cents.
    pub fn price_cents(self) -> i64 {
        match self {
            CreditPackage::Starter => 499,
            CreditPackage::Popular => 999,
            CreditPackage::Pro => 2499,
        }
    }

    pub fn tier(self) -> PlanTier {
        match self {
            CreditPackage::Starter => PlanTier::Starter,
            CreditPackage::Popular => PlanTier::Popular,
            CreditPackage::Pro => PlanTier::Pro,
        }
    }

    pub fn info(self) -> PackageInfo {
        PackageInfo {
            id: self,
            name: self.name(),
            credits: self.credits(),
            price_cents: self.price_cents(),
            currency: "usd",
        }
    }
}

impl fmt::Display for CreditPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditPackage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CreditPackage::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| CoreError::Validation(format!("Unknown credit package '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_get_cheaper_per_credit() {
        let per_credit: Vec<f64> = CreditPackage::ALL
            .iter()
            .map(|p| p.price_cents() as f64 / p.credits() as f64)
            .collect();
        assert!(per_credit.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn tier_only_goes_up() {
        assert_eq!(
            PlanTier::Free.upgraded_by(CreditPackage::Popular),
            PlanTier::Popular
        );
        assert_eq!(PlanTier::Pro.upgraded_by(CreditPackage::Starter), PlanTier::Pro);
    }

    #[test]
    fn package_parses_from_id() {
        assert_eq!("pro".parse::<CreditPackage>().unwrap(), CreditPackage::Pro);
        assert!("mega".parse::<CreditPackage>().is_err());
    }

    #[test]
    fn unknown_tier_from_db_is_free() {
        assert_eq!(PlanTier::from_db("enterprise"), PlanTier::Free);
        assert_eq!(PlanTier::from_db("pro"), PlanTier::Pro);
    }
}
