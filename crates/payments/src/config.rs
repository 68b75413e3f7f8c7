use roastme_core::credits::CreditPackage;

use crate::ProviderKind;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Base URL of the Stripe API (overridable for tests).
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct LemonSqueezyConfig {
    pub api_key: String,
    pub store_id: String,
    pub webhook_secret: String,
    pub variant_starter: String,
    pub variant_popular: String,
    pub variant_pro: String,
    pub api_base: String,
}

impl LemonSqueezyConfig {
    /// Store variant id selling `package`.
    pub fn variant_for(&self, package: CreditPackage) -> &str {
        match package {
            CreditPackage::Starter => &self.variant_starter,
            CreditPackage::Popular => &self.variant_popular,
            CreditPackage::Pro => &self.variant_pro,
        }
    }

    /// Package sold by store variant `variant_id`, if any.
    pub fn package_for_variant(&self, variant_id: &str) -> Option<CreditPackage> {
        CreditPackage::ALL
            .into_iter()
            .find(|p| self.variant_for(*p) == variant_id)
    }
}

/// Payment configuration loaded from environment variables.
///
/// Both providers may be configured at once so webhooks from either are
/// accepted; `provider` selects which one creates new checkouts.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub provider: ProviderKind,
    pub stripe: Option<StripeConfig>,
    pub lemonsqueezy: Option<LemonSqueezyConfig>,
}

impl PaymentConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Default                              |
    /// |--------------------------------|--------------------------------------|
    /// | `PAYMENT_PROVIDER`             | `stripe` (`stripe` or `lemonsqueezy`)|
    /// | `STRIPE_SECRET_KEY`            | (enables Stripe)                     |
    /// | `STRIPE_WEBHOOK_SECRET`        | (required with Stripe)               |
    /// | `LEMONSQUEEZY_API_KEY`         | (enables Lemon Squeezy)              |
    /// | `LEMONSQUEEZY_STORE_ID`        | (required with Lemon Squeezy)        |
    /// | `LEMONSQUEEZY_WEBHOOK_SECRET`  | (required with Lemon Squeezy)        |
    /// | `LEMONSQUEEZY_VARIANT_STARTER` | (required with Lemon Squeezy)        |
    /// | `LEMONSQUEEZY_VARIANT_POPULAR` | (required with Lemon Squeezy)        |
    /// | `LEMONSQUEEZY_VARIANT_PRO`     | (required with Lemon Squeezy)        |
    pub fn from_env() -> Self {
        let provider: ProviderKind = std::env::var("PAYMENT_PROVIDER")
            .unwrap_or_else(|_| "stripe".into())
            .parse()
            .unwrap_or_else(|e| panic!("PAYMENT_PROVIDER: {e}"));

        let stripe = non_empty("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET"),
            api_base: "https://api.stripe.com".into(),
        });

        let lemonsqueezy = non_empty("LEMONSQUEEZY_API_KEY").map(|api_key| LemonSqueezyConfig {
            api_key,
            store_id: required("LEMONSQUEEZY_STORE_ID"),
            webhook_secret: required("LEMONSQUEEZY_WEBHOOK_SECRET"),
            variant_starter: required("LEMONSQUEEZY_VARIANT_STARTER"),
            variant_popular: required("LEMONSQUEEZY_VARIANT_POPULAR"),
            variant_pro: required("LEMONSQUEEZY_VARIANT_PRO"),
            api_base: "https://api.lemonsqueezy.com".into(),
        });

        if stripe.is_none() && lemonsqueezy.is_none() {
            tracing::warn!("No payment provider configured; checkout and webhooks are disabled");
        }

        Self {
            provider,
            stripe,
            lemonsqueezy,
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &str) -> String {
    non_empty(var).unwrap_or_else(|| panic!("{var} must be set"))
}
