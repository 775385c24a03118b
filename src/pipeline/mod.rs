//! Pipeline stages for metadata extraction.
//!
//! Each submodule implements one step or one external collaborator. The
//! orchestrator in [`crate::extract`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ compact ──▶ llm ──▶ parse ──▶ normalize/merge ──▶ postprocess
//!  (path)  (pdftotext)  (budget)   (model)  (JSON)    (cross-check)      (cleanup)
//!            │
//!            └─(too little text / overflow)─▶ render ──▶ encode ──▶ llm ...
//!                                            (pdftoppm)  (cap, b64)
//! ```
//!
//! [`repair`] sits beside `text` and `render`: structural-corruption
//! failures from either trigger one qpdf/gs rewrite per run. [`heuristic`]
//! is the last resort when no model result is available.

pub mod compact;
pub mod encode;
pub mod heuristic;
pub mod input;
pub mod llm;
pub mod merge;
pub mod normalize;
pub mod parse;
pub mod postprocess;
pub mod render;
pub mod repair;
pub mod text;
pub mod tools;
