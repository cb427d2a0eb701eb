//! services/api/src/adapters/browser/mod.rs
//!
//! Browser automation: collects answers by driving a chat UI in a Chrome
//! instance that exposes a DevTools endpoint and already holds a signed-in
//! profile.
//!
//! ```bash
//! chrome --remote-debugging-port=9222 --user-data-dir=/path/to/profile
//! ```

pub mod cdp;
pub mod extractor;
mod page;

use async_trait::async_trait;
use genfuze_core::domain::QaPair;
use genfuze_core::ports::AnswerAutomationService;
use tracing::{info, warn};

pub use cdp::{CdpClient, CdpError, CdpPage};
pub use extractor::{AnswerExtractor, AutomationError, ChatPage, ExtractorConfig};

/// Implements `AnswerAutomationService` with one fresh tab per batch.
pub struct BrowserAutomationAdapter {
    debug_url: String,
    default_chat_url: String,
    extractor: AnswerExtractor,
}

impl BrowserAutomationAdapter {
    pub fn new(debug_url: String, default_chat_url: String, config: ExtractorConfig) -> Self {
        Self {
            debug_url,
            default_chat_url,
            extractor: AnswerExtractor::new(config),
        }
    }
}

#[async_trait]
impl AnswerAutomationService for BrowserAutomationAdapter {
    async fn collect_answers(&self, questions: &[String], chat_url: Option<&str>) -> Vec<QaPair> {
        let chat_url = chat_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.default_chat_url);
        info!(
            "Collecting {} answers from {} via {}",
            questions.len(),
            chat_url,
            self.debug_url
        );

        let client = match CdpClient::connect(&self.debug_url).await {
            Ok(client) => client,
            Err(e) => {
                return vec![extractor::automation_error(&AutomationError::Connection(e.to_string()))];
            }
        };
        let page = match client.new_page().await {
            Ok(page) => page,
            Err(e) => {
                return vec![extractor::automation_error(&AutomationError::Connection(e.to_string()))];
            }
        };

        let pairs = self.extractor.run(&page, chat_url, questions).await;

        if let Err(e) = client.close_page(&page).await {
            warn!("Failed to close automation tab: {}", e);
        }
        pairs
    }
}
