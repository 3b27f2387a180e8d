// src/models/slot.rs

//! Slot (logical category) definitions.

use serde::{Deserialize, Serialize};

use super::Source;

/// How the adapters of a slot are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotMode {
    /// Try sources in order, keep the first non-empty result
    #[default]
    Fallback,
    /// Query every source and concatenate in source order
    Merge,
}

/// Source-specific query parameters for a slot.
///
/// Each adapter reads the fields it understands and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    /// Free-text search keywords
    #[serde(default)]
    pub keywords: String,

    /// Marketplace category code (e.g. `MLB1051`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Storefront path override (e.g. `/s` or `/gp/bestsellers/electronics`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One unit of work per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Slot name used in logs and previews
    pub name: String,

    /// Adapters to use, in priority order
    pub sources: Vec<Source>,

    #[serde(default)]
    pub mode: SlotMode,

    /// Per-slot cap; falls back to `policy.per_slot_cap`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<usize>,

    #[serde(flatten)]
    pub query: SlotQuery,

    /// Message sent when the slot yields nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_notice: Option<String>,
}

impl SlotConfig {
    pub fn effective_cap(&self, default_cap: usize) -> usize {
        self.cap.unwrap_or(default_cap)
    }
}
