//! Account information: credit balance and subscription tier

use crate::client::MeshyClient;
use crate::endpoint::ApiVersion;
use crate::error::Result;
use crate::types::from_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credits left on the account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    #[serde(default)]
    pub credit_balance: i64,
    #[serde(default)]
    pub free_credit_balance: i64,
    #[serde(default)]
    pub share_credit_earned: i64,
    #[serde(default)]
    pub share_credit_earned_today: i64,
}

/// Subscription tier and its billing dates (Unix milliseconds, 0 if unset)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub refill_at: i64,
    #[serde(default)]
    pub renew_at: i64,
    #[serde(default)]
    pub cancel_at: i64,
}

impl Subscription {
    /// When the credit balance is next refilled
    pub fn refill_time(&self) -> Option<DateTime<Utc>> {
        from_millis(self.refill_at)
    }

    /// When the subscription renews
    pub fn renew_time(&self) -> Option<DateTime<Utc>> {
        from_millis(self.renew_at)
    }

    /// When a cancelled subscription ends
    pub fn cancel_time(&self) -> Option<DateTime<Utc>> {
        from_millis(self.cancel_at)
    }
}

impl MeshyClient {
    /// `GET /v1/me/credits`
    pub async fn credit_balance(&self) -> Result<CreditBalance> {
        let url = self
            .router()
            .resource_url(ApiVersion::V1, &["me", "credits"], &[]);
        self.get_json(&url, "credit balance").await
    }

    /// `GET /v1/me/tier`
    pub async fn subscription(&self) -> Result<Subscription> {
        let url = self
            .router()
            .resource_url(ApiVersion::V1, &["me", "tier"], &[]);
        self.get_json(&url, "subscription").await
    }
}
