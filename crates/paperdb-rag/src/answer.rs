//! Grounded answers with numbered references.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use paperdb_core::traits::{CompletionParams, Completer};
use paperdb_core::types::{Checksum, RetrievedChunk};
use paperdb_core::Result;

use crate::prompts;
use crate::retrieve::HybridRetriever;

pub const GENERAL_DISCLAIMER: &str =
    "Note: No relevant documents found in the index. Providing a general answer:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Backed by retrieved chunks.
    Grounded,
    /// Nothing was retrieved; the model answered from general knowledge.
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub number: usize,
    pub title: String,
    pub page_number: u32,
    pub document_checksum: Checksum,
    pub score: f32,
}

impl Reference {
    pub fn marker(&self) -> String {
        format!("[Ref{}]", self.number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub mode: AnswerMode,
    /// Model output, without disclaimer or legend.
    pub text: String,
    /// One entry per retrieved chunk, numbered from 1 in retrieval order.
    pub references: Vec<Reference>,
}

impl Answer {
    /// Text as shown to the user: disclaimer for general answers, reference
    /// legend for grounded ones.
    pub fn render(&self) -> String {
        match self.mode {
            AnswerMode::General => format!("{GENERAL_DISCLAIMER}\n\n{}", self.text),
            AnswerMode::Grounded => {
                let mut out = self.text.clone();
                out.push_str("\n\nReferences:");
                for r in &self.references {
                    let _ = write!(out, "\n{} Document: {}, Page: {}", r.marker(), r.title, r.page_number);
                }
                out
            }
        }
    }

    /// Reference numbers the model actually cited, ascending.
    pub fn cited_numbers(&self) -> Vec<usize> {
        ref_markers(&self.text).into_iter().map(|(_, n)| n).collect::<BTreeSet<_>>().into_iter().collect()
    }
}

/// Byte ranges and numbers of every `[RefN]` marker in `text`.
pub fn ref_markers(text: &str) -> Vec<(std::ops::Range<usize>, usize)> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(pos) = text[from..].find("[Ref") {
        let start = from + pos;
        let digits_start = start + 4;
        let digits: String = text[digits_start..].chars().take_while(char::is_ascii_digit).collect();
        let end = digits_start + digits.len();
        if !digits.is_empty() && text[end..].starts_with(']') {
            if let Ok(n) = digits.parse::<usize>() {
                out.push((start..end + 1, n));
            }
            from = end + 1;
        } else {
            from = digits_start;
        }
    }
    out
}

/// `[RefN] <text>` lines, numbered in retrieval order.
pub fn context_block(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[Ref{}] {}", i + 1, c.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct AnswerSynthesizer {
    retriever: HybridRetriever,
    completer: Arc<dyn Completer>,
    params: CompletionParams,
}

impl AnswerSynthesizer {
    pub fn new(retriever: HybridRetriever, completer: Arc<dyn Completer>, params: CompletionParams) -> Self {
        Self { retriever, completer, params }
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let chunks = self.retriever.retrieve(question).await?;
        self.answer_with(question, &chunks).await
    }

    /// Synthesize from already retrieved chunks. Exactly one completion call.
    pub async fn answer_with(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<Answer> {
        let question = question.trim();
        if chunks.is_empty() {
            info!("no context retrieved, answering from general knowledge");
            let text = self.completer.complete(&prompts::general(question), self.params).await?;
            return Ok(Answer { mode: AnswerMode::General, text: text.trim().to_string(), references: Vec::new() });
        }
        let prompt = prompts::grounded(&context_block(chunks), question);
        let text = self.completer.complete(&prompt, self.params).await?;
        let references = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| Reference {
                number: i + 1,
                title: c.chunk.title.clone(),
                page_number: c.chunk.page_number,
                document_checksum: c.chunk.document_checksum.clone(),
                score: c.score,
            })
            .collect();
        Ok(Answer { mode: AnswerMode::Grounded, text: text.trim().to_string(), references })
    }
}
