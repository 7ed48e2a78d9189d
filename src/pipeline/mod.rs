//! Pipeline stages for PDF-to-EPUB translation.
//!
//! Each submodule implements one transformation step and is testable on
//! its own; [`crate::orchestrator`] sequences them and owns job state.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ budget ──▶ llm / stub ──▶ epub
//! (stage)   (pdf+layout) (batches)  (translate)    (book)
//!                                        └──────▶ vocab (flashcards)
//! ```
//!
//! 1. [`input`]: make the stored upload readable as a local file
//! 2. [`extract`]: size/page limits, then [`pdf`] page blocks through the
//!    [`layout`] header/footer and de-hyphenation pass; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`budget`]: pack paragraphs into token-bounded batches
//! 4. [`llm`]: remote translation with retry/backoff
//! 5. [`epub`]: EPUB 3 container assembly
//! 6. [`vocab`]: flashcard ranking over [`lexicon`] word lists

pub mod budget;
pub mod epub;
pub mod extract;
pub mod input;
pub mod layout;
pub mod lexicon;
pub mod llm;
pub mod pdf;
pub mod vocab;
