pub mod browser;
pub mod db;
pub mod fetcher;
pub mod gemini_llm;
pub mod json_store;
pub mod memory;
pub mod openai_llm;
pub mod serper;

#[cfg(test)]
pub(crate) mod store_contract;

pub use browser::BrowserAutomationAdapter;
pub use db::DbAdapter;
pub use fetcher::HttpContentFetcher;
pub use gemini_llm::GeminiAdapter;
pub use json_store::JsonFileAdapter;
pub use memory::MemoryAdapter;
pub use openai_llm::{OpenAiChatAdapter, OpenAiEmbeddingAdapter};
pub use serper::SerperSearchAdapter;
