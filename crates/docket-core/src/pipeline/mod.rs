//! The document pipeline: classification, extraction, review, and the
//! session state machine that sequences them.
//!
//! Each stage is a thin engine that formats a prompt, calls its
//! configured LLM provider, and parses the structured response. The
//! stages are independent of each other; `DocumentSession` owns the
//! ordering.

pub(crate) mod classify;
pub(crate) mod extract;
pub(crate) mod parse;
pub(crate) mod review;
pub(crate) mod session;

pub use classify::Classifier;
pub use extract::Extractor;
pub use review::Reviewer;
pub use session::{DocumentSession, SessionState};
