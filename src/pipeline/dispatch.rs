// src/pipeline/dispatch.rs

//! Rendering offers into channel messages and delivering them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::channel::MessageChannel;
use crate::error::Result;
use crate::models::{DispatchConfig, Offer, Subscriptions};
use crate::utils::price::CurrencyFormat;
use crate::utils::{get_domain, truncate_graphemes};

use super::aggregate::SlotBatch;

/// Telegram caption limit, in characters.
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram message limit, in characters.
pub const TEXT_LIMIT: usize = 4096;

const TITLE_LIMIT: usize = 200;
const PRICE_LIMIT: usize = 64;

/// A rendered message, ready for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Photo { url: String, caption: String },
}

impl Message {
    pub fn body(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Photo { caption, .. } => caption,
        }
    }
}

/// How offers are turned into HTML messages.
#[derive(Debug, Clone)]
pub struct MessageFormat {
    currency: CurrencyFormat,
    highlight_label: String,
}

impl MessageFormat {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            currency: CurrencyFormat::from_config(config),
            highlight_label: config.highlight_label.clone(),
        }
    }

    /// Photo with caption when the offer has an image, plain text otherwise.
    ///
    /// The title is shortened before markup is applied, so a rendered
    /// message is never cut inside a tag or an entity.
    pub fn render(&self, offer: &Offer) -> Message {
        if let Some(image) = offer.image_url() {
            if let Some(caption) = self.fit(offer, CAPTION_LIMIT, true) {
                return Message::Photo {
                    url: image.to_string(),
                    caption,
                };
            }
        }

        let text = self
            .fit(offer, TEXT_LIMIT, true)
            .or_else(|| self.fit(offer, TEXT_LIMIT, false))
            .unwrap_or_else(|| self.body(offer, 0, false));
        Message::Text(text)
    }

    /// Shrink the title until the rendered body fits in `limit` characters.
    fn fit(&self, offer: &Offer, limit: usize, with_link: bool) -> Option<String> {
        let mut budget = TITLE_LIMIT;
        loop {
            let body = self.body(offer, budget, with_link);
            let len = body.chars().count();
            if len <= limit {
                return Some(body);
            }
            if budget == 0 {
                return None;
            }
            budget = budget.saturating_sub(len - limit);
        }
    }

    fn body(&self, offer: &Offer, title_budget: usize, with_link: bool) -> String {
        let title = truncate_graphemes(offer.title(), title_budget);
        let price = truncate_graphemes(&self.currency.render(offer.price_display()), PRICE_LIMIT);

        let mut lines = Vec::with_capacity(5);
        if offer.is_highlighted() && !self.highlight_label.is_empty() {
            lines.push(format!("<b>{}</b>", escape(&self.highlight_label)));
        }
        lines.push(format!("<b>{}</b>", escape(&title)));
        lines.push(format!("💰 {}", escape(&price)));
        if with_link {
            let label = get_domain(offer.url()).unwrap_or_else(|| offer.source().to_string());
            lines.push(format!(
                "🔗 <a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(offer.url()),
                escape(&label)
            ));
        }
        lines.join("\n")
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Counts for one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Of `sent`, how many were photo sends that fell back to text
    pub fallbacks: usize,
}

/// Enforces a minimum gap between sends to the same destination.
struct Pacer {
    min_delay: Duration,
    last_sent: HashMap<String, Instant>,
}

impl Pacer {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_sent: HashMap::new(),
        }
    }

    async fn wait(&mut self, destination: &str) {
        if let Some(last) = self.last_sent.get(destination) {
            tokio::time::sleep_until(*last + self.min_delay).await;
        }
        self.last_sent.insert(destination.to_string(), Instant::now());
    }
}

enum Delivery {
    Direct,
    TextFallback,
}

/// Sends slot batches to every subscribed destination.
pub struct Dispatcher {
    channel: Arc<dyn MessageChannel>,
    format: MessageFormat,
    min_delay: Duration,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn MessageChannel>, format: MessageFormat, min_delay: Duration) -> Self {
        Self {
            channel,
            format,
            min_delay,
        }
    }

    pub fn from_config(channel: Arc<dyn MessageChannel>, config: &DispatchConfig) -> Self {
        Self::new(
            channel,
            MessageFormat::from_config(config),
            Duration::from_millis(config.min_delay_ms),
        )
    }

    pub fn format(&self) -> &MessageFormat {
        &self.format
    }

    /// Send every batch to every active destination.
    ///
    /// A failed send is logged and counted; the rest of the batch still goes out.
    pub async fn dispatch(&self, batches: &[SlotBatch], subscriptions: &Subscriptions) -> DispatchReport {
        let destinations = subscriptions.active();
        let mut report = DispatchReport::default();

        if destinations.is_empty() {
            log::info!("No active destinations, nothing dispatched");
            return report;
        }

        let mut pacer = Pacer::new(self.min_delay);

        for batch in batches {
            let messages: Vec<Message> = if batch.offers.is_empty() {
                match &batch.empty_notice {
                    Some(notice) if batch.came_back_empty() => {
                        vec![Message::Text(truncate_graphemes(notice, TEXT_LIMIT))]
                    }
                    _ => continue,
                }
            } else {
                batch.offers.iter().map(|o| self.format.render(o)).collect()
            };

            for message in &messages {
                for destination in &destinations {
                    match self.deliver(&mut pacer, destination, message).await {
                        Ok(Delivery::Direct) => report.sent += 1,
                        Ok(Delivery::TextFallback) => {
                            report.sent += 1;
                            report.fallbacks += 1;
                        }
                        Err(e) => {
                            report.failed += 1;
                            log::warn!("Slot '{}': send failed: {}", batch.slot, e);
                        }
                    }
                }
            }
        }

        report
    }

    /// Every channel call, the text fallback included, waits on the pacer.
    async fn deliver(&self, pacer: &mut Pacer, destination: &str, message: &Message) -> Result<Delivery> {
        pacer.wait(destination).await;
        match message {
            Message::Text(text) => {
                self.channel.send_text(destination, text).await?;
                Ok(Delivery::Direct)
            }
            Message::Photo { url, caption } => {
                match self.channel.send_photo(destination, url, caption).await {
                    Ok(()) => Ok(Delivery::Direct),
                    Err(e) => {
                        log::debug!("Photo send to {destination} failed ({e}), sending as text");
                        pacer.wait(destination).await;
                        self.channel.send_text(destination, caption).await?;
                        Ok(Delivery::TextFallback)
                    }
                }
            }
        }
    }
}
