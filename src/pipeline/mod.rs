//! Per-document pipeline stages.
//!
//! Each submodule implements exactly one transformation step and is tested
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ llm ──▶ validate
//! (path/URL) (render+encode) (service) (schema)
//! ```
//!
//! 1. [`input`]     — read a path or download a URL into an `InputDocument`
//! 2. [`rasterize`] — images pass through; PDFs go through [`render`]
//!    (pdfium, on the blocking pool) and [`encode`] (JPEG)
//! 3. [`llm`]       — one Extraction Service call per document with
//!    retry/backoff; the only stage with service I/O
//! 4. [`validate`]  — parse and check the response against the shared schema
//!
//! [`crate::batch`] drives these stages for every document in order.

pub mod encode;
pub mod input;
pub mod llm;
pub mod rasterize;
pub mod render;
pub mod validate;
