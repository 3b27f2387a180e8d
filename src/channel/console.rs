// src/channel/console.rs

use async_trait::async_trait;

use crate::error::Result;

use super::MessageChannel;

/// Channel that only logs what would have been sent.
#[derive(Debug, Default, Clone)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageChannel for ConsoleChannel {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        log::info!("[dry-run] -> {destination}\n{text}");
        Ok(())
    }

    async fn send_photo(&self, destination: &str, photo_url: &str, caption: &str) -> Result<()> {
        log::info!("[dry-run] -> {destination} (photo {photo_url})\n{caption}");
        Ok(())
    }
}
