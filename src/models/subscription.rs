// src/models/subscription.rs

//! Per-destination posting state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Posting state of a single destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub enabled: bool,
}

/// Destinations the dispatcher may post to, keyed by chat id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriptions {
    destinations: BTreeMap<String, Subscription>,
}

impl Subscriptions {
    /// Every given destination starts enabled.
    pub fn enabled_for<I, S>(destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let destinations = destinations
            .into_iter()
            .map(Into::into)
            .filter(|d: &String| !d.trim().is_empty())
            .map(|d| (d, Subscription { enabled: true }))
            .collect();
        Self { destinations }
    }

    pub fn enable(&mut self, destination: impl Into<String>) {
        self.destinations
            .insert(destination.into(), Subscription { enabled: true });
    }

    /// Disable a destination; returns false when it was unknown.
    pub fn disable(&mut self, destination: &str) -> bool {
        match self.destinations.get_mut(destination) {
            Some(sub) => {
                sub.enabled = false;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, destination: &str) -> bool {
        self.destinations
            .get(destination)
            .is_some_and(|sub| sub.enabled)
    }

    /// Enabled destinations in stable (sorted) order.
    pub fn active(&self) -> Vec<&str> {
        self.destinations
            .iter()
            .filter(|(_, sub)| sub.enabled)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Session state shared between the scheduler and anything that toggles posting.
#[derive(Debug, Default)]
pub struct SessionState {
    subscriptions: RwLock<Subscriptions>,
}

impl SessionState {
    pub fn new(subscriptions: Subscriptions) -> Self {
        Self {
            subscriptions: RwLock::new(subscriptions),
        }
    }

    /// Copy of the current subscriptions, taken once per cycle.
    pub async fn snapshot(&self) -> Subscriptions {
        self.subscriptions.read().await.clone()
    }

    pub async fn enable(&self, destination: impl Into<String>) {
        self.subscriptions.write().await.enable(destination);
    }

    pub async fn disable(&self, destination: &str) -> bool {
        self.subscriptions.write().await.disable(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_for_skips_blank_ids() {
        let subs = Subscriptions::enabled_for(["-100200", " ", "-100100"]);
        assert_eq!(subs.active(), vec!["-100100", "-100200"]);
    }

    #[test]
    fn test_disable_and_enable() {
        let mut subs = Subscriptions::enabled_for(["a", "b"]);
        assert!(subs.disable("a"));
        assert!(!subs.disable("zzz"));
        assert!(!subs.is_enabled("a"));
        assert_eq!(subs.active(), vec!["b"]);

        subs.enable("a");
        assert!(subs.is_enabled("a"));
    }

    #[tokio::test]
    async fn test_session_snapshot_is_detached() {
        let session = SessionState::new(Subscriptions::enabled_for(["chat"]));
        let before = session.snapshot().await;
        session.disable("chat").await;

        assert!(before.is_enabled("chat"));
        assert!(!session.snapshot().await.is_enabled("chat"));
    }
}
