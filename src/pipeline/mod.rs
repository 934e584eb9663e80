//! Pipeline stages for problem conversion.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! page ──▶ extract ──▶ prompt ──▶ llm ──▶ parse
//! (host)   (DOM→text)  (template) (HTTP)  (JSON→record)
//! ```
//!
//! 1. [`page`]    — the host-page capability and its adapters (memory, file, URL)
//! 2. [`extract`] — read the problem statement into one normalised text blob
//! 3. [`crate::prompts`] — embed the blob into the fixed instruction template
//! 4. [`llm`]     — call the generation endpoint with timeout and retry; the
//!    only stage talking to the model
//! 5. [`parse`]   — strip fences, parse JSON, validate the record schema

pub mod extract;
pub mod llm;
pub mod page;
pub mod parse;
