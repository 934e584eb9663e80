//! # cf2lc
//!
//! Convert Codeforces problem statements into LeetCode-style records using a
//! generative language model.
//!
//! A Codeforces statement is prose written for stdin/stdout judges. This
//! crate scrapes the statement from the problem page, asks Gemini to rewrite
//! it around a C++ `class Solution` method signature, and validates the JSON
//! that comes back into a typed [`ProblemRecord`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! problem page
//!  │
//!  ├─ 1. Extract   run a read-only routine inside the page (DOM → text blob)
//!  ├─ 2. Prompt    embed the blob into the instruction template
//!  ├─ 3. Generate  one generateContent call (timeout + bounded retry)
//!  └─ 4. Parse     strip fences, parse JSON, validate every field
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cf2lc::{convert, ConversionConfig, RemotePage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY
//!     let config = ConversionConfig::from_env()?;
//!     let page = RemotePage::new("https://codeforces.com/problemset/problem/4/A", 30);
//!     let record = convert(&page, &config).await?;
//!     println!("{}", record.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cf2lc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cf2lc = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, ConversionConfig, ConversionConfigBuilder, GenerationParams};
pub use convert::{
    convert, convert_html, convert_sync, convert_text, convert_to_file, extract_text,
    page_for_input, write_record,
};
pub use error::{Cf2LcError, StageError};
pub use output::{Difficulty, Example, ExportFormat, ProblemRecord, RawProblemText};
pub use pipeline::llm::{GeminiClient, GenerationBackend};
pub use pipeline::page::{FilePage, HostPage, RemotePage, StaticPage};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, PipelineStage, ProgressCallback,
};
pub use prompts::{build_prompt, DEFAULT_PROMPT_TEMPLATE};
