//! services/api/src/adapters/browser/extractor.rs
//!
//! Drives a chat UI one question at a time and scrapes the rendered answers.
//!
//! The target DOM is unversioned, so every step works from ordered lists of
//! guesses: input selectors, a chain of submission strategies, and response
//! selectors polled with exponential backoff before falling back to the page's
//! body text. Per-question failures become sentinel answers; only session-level
//! failures abort the batch.

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use genfuze_core::domain::QaPair;
use rand::Rng;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::cdp::CdpError;

pub const AUTOMATION_ERROR_QUESTION: &str = "[Automation error]";
pub const NO_ANSWER: &str = "[No answer found]";

/// Chat inputs, most specific first.
pub const INPUT_SELECTORS: &[&str] = &[
    "#prompt-textarea",
    "textarea[data-id='root']",
    "textarea[placeholder*='Message']",
    "textarea[placeholder*='Ask']",
    "div[contenteditable='true'][role='textbox']",
    "div.ProseMirror[contenteditable='true']",
    "[contenteditable='true']",
    "[role='textbox']",
    "textarea",
    "input[type='text']",
];

/// Places an answer may render, from provider-specific hooks down to generic text blocks.
pub const RESPONSE_SELECTORS: &[&str] = &[
    "[data-message-author-role='assistant'] .markdown",
    "[data-message-author-role='assistant']",
    "[data-testid^='conversation-turn'] .markdown",
    "[data-testid='bot-message']",
    "[data-testid='assistant-message']",
    "[data-testid='chat-message-content']",
    ".agent-turn .markdown",
    "div.markdown.prose",
    ".markdown",
    ".prose",
    "message-content",
    ".model-response-text",
    ".response-content",
    ".message-content",
    ".chat-message.assistant",
    "[class*='answer']",
    "[class*='response']",
    "article",
    "pre",
    "p",
    "div",
];

/// Phrases that mean the site is refusing or challenging us rather than answering.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "captcha",
    "blocked",
    "detected",
    "unusual activity",
    "verify you are human",
    "access denied",
    "too many requests",
    "something went wrong",
    "rate limit",
];

//=========================================================================================
// Errors and the page abstraction
//=========================================================================================

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Browser connection failed: {0}")]
    Connection(String),

    #[error("No chat input appeared after {attempts} attempts; is the profile signed in?")]
    LoginTimeout { attempts: u32 },

    #[error("Page interaction failed: {0}")]
    Page(String),
}

impl From<CdpError> for AutomationError {
    fn from(e: CdpError) -> Self {
        AutomationError::Page(e.to_string())
    }
}

/// An element's own text plus the texts of its direct children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementText {
    pub text: String,
    pub children: Vec<String>,
}

impl ElementText {
    /// The element's text, or its children's texts joined when its own is too short.
    pub fn best_text(&self, min_chars: usize) -> String {
        let own = self.text.trim();
        if own.chars().count() >= min_chars {
            return own.to_string();
        }
        let joined = self
            .children
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if joined.chars().count() > own.chars().count() {
            joined
        } else {
            own.to_string()
        }
    }
}

/// What the extractor needs from a browser tab.
#[async_trait]
pub trait ChatPage: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), AutomationError>;

    /// Returns the first selector with a visible, enabled match and remembers that
    /// element as the current input.
    async fn find_input(&self, selectors: &[&str]) -> Result<Option<String>, AutomationError>;

    /// Focuses the remembered input and empties it.
    async fn clear_input(&self) -> Result<(), AutomationError>;

    async fn type_text(&self, text: &str) -> Result<(), AutomationError>;

    /// A native Enter key press.
    async fn press_enter(&self) -> Result<(), AutomationError>;

    /// The raw-key-down plus `char` variant some editors listen for instead.
    async fn press_return(&self) -> Result<(), AutomationError>;

    /// A synthesized `KeyboardEvent` dispatched on the input by script.
    async fn dispatch_enter_event(&self) -> Result<(), AutomationError>;

    /// The last element matching `selector`, if any.
    async fn last_element_text(&self, selector: &str) -> Result<Option<ElementText>, AutomationError>;

    async fn body_text(&self) -> Result<String, AutomationError>;
}

//=========================================================================================
// Configuration
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub login_attempts: u32,
    pub login_interval: Duration,
    pub response_timeout: Duration,
    pub poll_initial: Duration,
    pub poll_max: Duration,
    pub min_answer_chars: usize,
    /// Pause between typed characters, in milliseconds.
    pub typing_delay_ms: RangeInclusive<u64>,
    /// Pause between questions, in milliseconds.
    pub question_delay_ms: RangeInclusive<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            login_attempts: 60,
            login_interval: Duration::from_secs(1),
            response_timeout: Duration::from_secs(30),
            poll_initial: Duration::from_millis(500),
            poll_max: Duration::from_secs(4),
            min_answer_chars: 20,
            typing_delay_ms: 30..=120,
            question_delay_ms: 1500..=4000,
        }
    }
}

/// Doubles `current`, capped at `max`.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

fn random_delay(range: &RangeInclusive<u64>) -> Duration {
    if range.start() >= range.end() {
        return Duration::from_millis(*range.start());
    }
    Duration::from_millis(rand::thread_rng().gen_range(range.clone()))
}

//=========================================================================================
// Candidate judging
//=========================================================================================

#[derive(Debug, PartialEq)]
enum Verdict {
    Accept,
    Blocked(&'static str),
    Reject,
}

/// Finds the first blocked keyword in `text`, case-insensitively.
pub fn blocked_keyword(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    BLOCKED_KEYWORDS.iter().copied().find(|k| lower.contains(k))
}

//=========================================================================================
// The Extractor
//=========================================================================================

pub struct AnswerExtractor {
    config: ExtractorConfig,
}

impl AnswerExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Asks every question in order. Always returns one pair per question, or a single
    /// `[Automation error]` pair when the session itself could not be established.
    pub async fn run(&self, page: &dyn ChatPage, chat_url: &str, questions: &[String]) -> Vec<QaPair> {
        match self.try_run(page, chat_url, questions).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Browser automation aborted: {}", e);
                vec![automation_error(&e)]
            }
        }
    }

    async fn try_run(
        &self,
        page: &dyn ChatPage,
        chat_url: &str,
        questions: &[String],
    ) -> Result<Vec<QaPair>, AutomationError> {
        page.open(chat_url).await?;
        self.wait_for_login(page).await?;

        let mut pairs = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            if i > 0 {
                sleep(random_delay(&self.config.question_delay_ms)).await;
            }
            let answer = self.ask(page, question).await;
            info!("Question {}/{} answered ({} chars)", i + 1, questions.len(), answer.chars().count());
            pairs.push(QaPair {
                question: question.clone(),
                answer,
            });
        }
        Ok(pairs)
    }

    /// Polls for a chat input until one appears. A missing input usually means the
    /// profile is still on a sign-in page.
    async fn wait_for_login(&self, page: &dyn ChatPage) -> Result<String, AutomationError> {
        for attempt in 1..=self.config.login_attempts {
            match page.find_input(INPUT_SELECTORS).await {
                Ok(Some(selector)) => {
                    debug!("Chat input '{}' found on attempt {}", selector, attempt);
                    return Ok(selector);
                }
                Ok(None) => {}
                Err(e) => debug!("Input probe {} failed: {}", attempt, e),
            }
            if attempt < self.config.login_attempts {
                sleep(self.config.login_interval).await;
            }
        }
        Err(AutomationError::LoginTimeout {
            attempts: self.config.login_attempts,
        })
    }

    async fn ask(&self, page: &dyn ChatPage, question: &str) -> String {
        match page.find_input(INPUT_SELECTORS).await {
            Ok(Some(_)) => {}
            Ok(None) => return "[Input not found] no visible chat input matched".to_string(),
            Err(e) => return format!("[Input not found] {}", e),
        }

        // Whatever is on screen now belongs to an earlier turn.
        let baseline = self.snapshot(page).await;

        if let Err(e) = self.type_question(page, question).await {
            return format!("[Submission failed] {}", e);
        }
        if let Err(e) = self.submit(page).await {
            return format!("[Submission failed] {}", e);
        }

        self.poll_answer(page, question, &baseline).await
    }

    async fn type_question(&self, page: &dyn ChatPage, question: &str) -> Result<(), AutomationError> {
        page.clear_input().await?;
        let mut buf = [0u8; 4];
        for c in question.chars() {
            page.type_text(c.encode_utf8(&mut buf)).await?;
            sleep(random_delay(&self.config.typing_delay_ms)).await;
        }
        Ok(())
    }

    /// Tries each submission strategy in turn and stops at the first that does not error.
    async fn submit(&self, page: &dyn ChatPage) -> Result<(), AutomationError> {
        if let Err(e) = page.press_enter().await {
            debug!("Enter submission failed: {}", e);
        } else {
            return Ok(());
        }
        if let Err(e) = page.press_return().await {
            debug!("Return submission failed: {}", e);
        } else {
            return Ok(());
        }
        page.dispatch_enter_event().await
    }

    /// The text every response selector shows right now.
    async fn snapshot(&self, page: &dyn ChatPage) -> Vec<String> {
        let mut seen = Vec::new();
        for selector in RESPONSE_SELECTORS {
            if let Ok(Some(element)) = page.last_element_text(selector).await {
                let text = element.best_text(self.config.min_answer_chars);
                if !text.is_empty() {
                    seen.push(text);
                }
            }
        }
        seen
    }

    fn judge(&self, candidate: &str, question: &str, baseline: &[String]) -> Verdict {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate.eq_ignore_ascii_case(question.trim()) {
            return Verdict::Reject;
        }
        if let Some(keyword) = blocked_keyword(candidate) {
            return Verdict::Blocked(keyword);
        }
        if candidate.chars().count() < self.config.min_answer_chars {
            return Verdict::Reject;
        }
        // Any fragment of text that was already rendered is stale.
        if baseline.iter().any(|earlier| earlier.contains(candidate)) {
            return Verdict::Reject;
        }
        Verdict::Accept
    }

    async fn poll_answer(&self, page: &dyn ChatPage, question: &str, baseline: &[String]) -> String {
        let deadline = Instant::now() + self.config.response_timeout;
        let mut delay = self.config.poll_initial;
        let mut blocked: Option<&'static str> = None;

        loop {
            for selector in RESPONSE_SELECTORS {
                let element = match page.last_element_text(selector).await {
                    Ok(Some(element)) => element,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!("Selector '{}' probe failed: {}", selector, e);
                        continue;
                    }
                };
                let candidate = element.best_text(self.config.min_answer_chars);
                match self.judge(&candidate, question, baseline) {
                    Verdict::Accept => {
                        debug!("Answer found with selector '{}'", selector);
                        return candidate;
                    }
                    Verdict::Blocked(keyword) => blocked = Some(keyword),
                    Verdict::Reject => {}
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(delay.min(deadline - now)).await;
            delay = next_backoff(delay, self.config.poll_max);
        }

        match page.body_text().await {
            Ok(body) => {
                for line in body.lines().rev() {
                    match self.judge(line, question, baseline) {
                        Verdict::Accept => {
                            debug!("Answer recovered from body text");
                            return line.trim().to_string();
                        }
                        Verdict::Blocked(keyword) => {
                            blocked.get_or_insert(keyword);
                        }
                        Verdict::Reject => {}
                    }
                }
            }
            Err(e) => debug!("Body text fallback failed: {}", e),
        }

        match blocked {
            Some(keyword) => format!("[Blocked] the page reported '{}'", keyword),
            None => NO_ANSWER.to_string(),
        }
    }
}

pub fn automation_error(error: &AutomationError) -> QaPair {
    QaPair {
        question: AUTOMATION_ERROR_QUESTION.to_string(),
        answer: error.to_string(),
    }
}
