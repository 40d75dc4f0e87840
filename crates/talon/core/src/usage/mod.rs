// Talon
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Monthly usage quota for free-tier callers

pub mod store;

pub use store::{FileUsageStore, InMemoryUsageStore, UsageError, UsageStore};

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Monthly request quota for the free tier
pub const DEFAULT_FREE_TIER_LIMIT: u32 = 100;

/// Where rejected callers are sent to upgrade
pub const DEFAULT_UPGRADE_URL: &str = "https://marketplace.visualstudio.com/items?itemName=talon.error-prevention";

/// Subscription tier of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
}

/// Counter key: a user within one billing period (`YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    pub user_id: String,
    pub period: String,
}

impl UsageKey {
    pub fn new(user_id: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            period: period.into(),
        }
    }

    /// Key for the calendar month containing `now`
    pub fn for_month(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(user_id, billing_period(now))
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.period)
    }
}

/// Calendar month bucket of a timestamp
pub fn billing_period(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Usage reported back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Count(u32),
    Unlimited,
}

impl Serialize for Usage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Usage::Count(count) => serializer.serialize_u32(*count),
            Usage::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageDecision {
    Allowed(Usage),
    Rejected { reason: String, upgrade_url: String },
}

/// Enforces the free-tier quota; pro callers pass untouched
#[derive(Clone)]
pub struct UsageGate {
    store: Arc<dyn UsageStore>,
    limit: u32,
    upgrade_url: String,
}

impl UsageGate {
    pub fn new(store: Arc<dyn UsageStore>, limit: u32, upgrade_url: impl Into<String>) -> Self {
        Self {
            store,
            limit,
            upgrade_url: upgrade_url.into(),
        }
    }

    /// Gate over process-lifetime counters with the default quota
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryUsageStore::new()), DEFAULT_FREE_TIER_LIMIT, DEFAULT_UPGRADE_URL)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check the quota and record one request when allowed
    pub async fn check_and_increment(&self, user_id: &str, tier: Tier, now: DateTime<Utc>) -> Result<UsageDecision, UsageError> {
        if tier == Tier::Pro {
            return Ok(UsageDecision::Allowed(Usage::Unlimited));
        }

        let key = UsageKey::for_month(user_id, now);
        match self.store.increment_if_below(&key, self.limit).await? {
            Some(count) => Ok(UsageDecision::Allowed(Usage::Count(count))),
            None => {
                info!("Free tier limit reached for {}", key);
                counter!("talon_quota_rejections_total", 1);
                Ok(UsageDecision::Rejected {
                    reason: "Free tier limit reached".to_string(),
                    upgrade_url: self.upgrade_url.clone(),
                })
            }
        }
    }
}
