// src/notify/subscribers.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::model::{EventCategory, RecipientId, Subscription};

/// Who listens to which category. Backed by config here; a database in larger setups.
#[async_trait::async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn active_subscribers(&self, subscription: Subscription) -> Result<Vec<RecipientId>>;
}

/// `[[subscriptions]]` entry in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub recipient: RecipientId,
    pub categories: Vec<Subscription>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct StaticSubscribers {
    by_subscription: HashMap<Subscription, BTreeSet<RecipientId>>,
}

impl StaticSubscribers {
    pub fn from_entries(entries: &[SubscriptionEntry]) -> Self {
        let mut by_subscription: HashMap<Subscription, BTreeSet<RecipientId>> = HashMap::new();
        for e in entries.iter().filter(|e| e.active) {
            for sub in &e.categories {
                by_subscription.entry(*sub).or_default().insert(e.recipient);
            }
        }
        Self { by_subscription }
    }

    pub fn is_empty(&self) -> bool {
        self.by_subscription.values().all(|s| s.is_empty())
    }
}

#[async_trait::async_trait]
impl SubscriberDirectory for StaticSubscribers {
    async fn active_subscribers(&self, subscription: Subscription) -> Result<Vec<RecipientId>> {
        Ok(self
            .by_subscription
            .get(&subscription)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default())
    }
}

/// Recipients of `category` plus everyone subscribed to all events,
/// deduplicated, ascending.
pub async fn fan_out(
    dir: &dyn SubscriberDirectory,
    category: EventCategory,
) -> Result<Vec<RecipientId>> {
    let mut set: BTreeSet<RecipientId> = BTreeSet::new();
    set.extend(dir.active_subscribers(category.into()).await?);
    set.extend(dir.active_subscribers(Subscription::All).await?);
    Ok(set.into_iter().collect())
}
