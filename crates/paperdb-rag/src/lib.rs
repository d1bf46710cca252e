//! The retrieval-and-answer pipeline.
//!
//! Write path: [`ingest::IngestPipeline`] turns a folder of documents into
//! stored chunks. Read path: [`refine::QueryRefiner`] decomposes a question,
//! [`retrieve::HybridRetriever`] gathers context and
//! [`answer::AnswerSynthesizer`] produces a cited answer.

pub mod answer;
pub mod ingest;
pub mod llm;
pub mod prompts;
pub mod refine;
pub mod retrieve;

pub use answer::{Answer, AnswerMode, AnswerSynthesizer, Reference};
pub use ingest::{IngestObserver, IngestPipeline, IngestReport, NoopObserver, SkipReason};
pub use llm::OpenAiCompleter;
pub use refine::QueryRefiner;
pub use retrieve::HybridRetriever;
