//! Extraction and ranking pipeline for wordrank, plus the local Playwright renderer.
//!
//! Data flows one way: rendered element snapshot → visible text → refined text → ranked words.

pub mod pipeline;
pub mod rank;
pub mod refine;
pub mod render_playwright;
pub mod visibility;

pub use pipeline::{analyze_text, parse_request, validate_url, AnalyzeOptions, Analyzer};
pub use rank::{rank, StopWordSet, DEFAULT_STOP_WORDS};
pub use refine::refine;
pub use render_playwright::{PlaywrightConfig, PlaywrightRenderer};
