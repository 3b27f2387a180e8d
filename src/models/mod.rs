// src/models/mod.rs

//! Domain models for the relay application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod offer;
mod slot;
mod subscription;

// Re-export all public types
pub use config::{
    AffiliateConfig, Config, DispatchConfig, HttpConfig, MarketplaceConfig, PartnerConfig,
    PolicyConfig, RetryConfig, ScheduleConfig, SourcesConfig, StorefrontConfig,
    StorefrontSelectors, TelegramConfig,
};
pub use offer::{Offer, Source};
pub use slot::{SlotConfig, SlotMode, SlotQuery};
pub use subscription::{SessionState, Subscription, Subscriptions};
