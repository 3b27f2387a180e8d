//! Cycle pipeline.
//!
//! - `aggregate`: run every slot against its adapters, apply caps
//! - `fallback`: ordered single-pass fallback across adapters
//! - `dispatch`: render offers and send them with per-destination pacing
//! - `scheduler`: fixed-interval, skip-if-running cycle loop
//! - `cycle`: one aggregate-then-dispatch cycle and its statistics

mod aggregate;
mod cycle;
mod dispatch;
mod fallback;
mod scheduler;

pub use aggregate::{Aggregator, SlotBatch, highlight_flags};
pub use cycle::{CycleStats, Pipeline, run_scheduled};
pub use dispatch::{CAPTION_LIMIT, DispatchReport, Dispatcher, Message, MessageFormat, TEXT_LIMIT};
pub use fallback::{AttemptStatus, FallbackChain, SlotFetch, SourceAttempt};
pub use scheduler::Scheduler;
