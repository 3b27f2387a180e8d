//! Outbound messaging channels.
//!
//! - `TelegramChannel`: Telegram Bot API (`sendMessage` / `sendPhoto`)
//! - `ConsoleChannel`: logs messages instead of sending them (dry runs)

mod console;
mod telegram;

use async_trait::async_trait;

use crate::error::Result;

pub use console::ConsoleChannel;
pub use telegram::TelegramChannel;

/// Delivery of rendered HTML messages to a destination (chat id).
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()>;

    async fn send_photo(&self, destination: &str, photo_url: &str, caption: &str) -> Result<()>;
}
