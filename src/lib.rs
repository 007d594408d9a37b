//! AI-assisted stock screening: strategy filters are rendered into a
//! search-grounded Gemini prompt, the completion is scraped for a JSON array of
//! candidates and normalised into display cards.

pub mod api;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod normalize;
pub mod prompt;
pub mod remote;
pub mod screener;
pub mod session;
pub mod types;
