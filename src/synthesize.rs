//! Grounded answer synthesis.
//!
//! Builds the QA prompt from the retrieved chunks, sends it with the
//! conversation so far, and clips the reply to the configured number of
//! sentences. The prompt tells the model to admit when the context does
//! not contain the answer.

use std::sync::Arc;

use docchat_core::models::{ScoredChunk, Turn};

use crate::error::{ChatError, Stage};
use crate::llm::{ChatMessage, ChatModel};

pub struct AnswerSynthesizer {
    llm: Arc<dyn ChatModel>,
    template: String,
    max_sentences: usize,
}

impl AnswerSynthesizer {
    /// `template` may contain `{context}` and `{max_sentences}`.
    pub fn new(llm: Arc<dyn ChatModel>, template: impl Into<String>, max_sentences: usize) -> Self {
        Self {
            llm,
            template: template.into(),
            max_sentences: max_sentences.max(1),
        }
    }

    /// Answer `question` from `chunks`, with `transcript` as prior turns.
    ///
    /// `question` is the user's own wording; follow-ups are resolved by the
    /// model from the transcript.
    pub async fn synthesize(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        transcript: &[Turn],
    ) -> Result<String, ChatError> {
        let mut messages = Vec::with_capacity(transcript.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt(chunks)));
        messages.extend(transcript.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(question));

        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| ChatError::LanguageModelService {
                stage: Stage::Synthesize,
                source: e,
            })?;

        Ok(limit_sentences(reply.trim(), self.max_sentences))
    }

    fn system_prompt(&self, chunks: &[ScoredChunk]) -> String {
        let context = chunks
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.template
            .replace("{max_sentences}", &self.max_sentences.to_string())
            .replace("{context}", &context)
    }
}

/// Titles and abbreviations whose trailing period never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "no", "fig", "approx", "inc",
    "ltd", "co", "mt",
];

/// Keep at most `max` sentences of `text`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// the text, so decimals such as `3.5` do not count as boundaries. A period
/// after a list marker (`1.`), an initialism (`D.C.`, `e.g.`), or a known
/// abbreviation (`Dr.`) does not end a sentence either.
pub fn limit_sentences(text: &str, max: usize) -> String {
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = idx + c.len_utf8();
        // Absorb runs like "?!" or "..." and closing quotes/brackets.
        while let Some(&(next_idx, next)) = chars.peek() {
            if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201d}') {
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some(&(_, next)) => next.is_whitespace(),
        };
        if at_boundary && !(c == '.' && period_is_not_terminal(text, idx)) {
            seen += 1;
            if seen == max {
                return text[..end].trim_end().to_string();
            }
        }
    }

    text.trim_end().to_string()
}

/// Whether the period at byte `dot` closes a list marker or abbreviation.
fn period_is_not_terminal(text: &str, dot: usize) -> bool {
    let before = &text[..dot];
    let word_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = before[word_start..]
        .trim_start_matches(|c: char| matches!(c, '(' | '[' | '"' | '\'' | '\u{201c}'));
    if word.is_empty() {
        return false;
    }

    if word.chars().all(|c| c.is_ascii_digit()) {
        // "1." opens a list item only at the start of a line or sentence;
        // "there are 42." still ends one.
        let prev = before[..word_start].trim_end_matches([' ', '\t']);
        return prev.is_empty() || prev.ends_with(['\n', '.', '!', '?', ':']);
    }

    let initialism = word
        .split('.')
        .all(|part| part.chars().count() == 1 && part.chars().all(char::is_alphabetic));
    initialism || ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}
