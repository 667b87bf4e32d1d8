//! The daily market-news digest: news per watched symbol is summarized once,
//! cached for the day and mailed to every subscribed user.

pub mod assemble;
pub mod gemini;
pub mod job;
pub mod prompts;
pub mod retry;
pub mod scheduler;
pub mod sections;
pub mod store;

pub use gemini::{GeminiClient, Summarizer};
pub use job::DigestJob;
