//! Deterministic stand-ins for the embedding and language model services.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat::app::ChatApp;
use docchat::config::Config;
use docchat::embedding::Embedder;
use docchat::ingest::UploadedDocument;
use docchat::llm::{ChatMessage, ChatModel, ChatRole};

const DIMS: usize = 256;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "is", "of", "what", "which", "who", "in", "to", "it", "its", "does",
];

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Bag-of-words embedder: each non-stopword bumps one hashed dimension.
///
/// Setting `shrink` halves the output length, as if the model had changed.
#[derive(Default)]
pub struct HashEmbedder {
    pub fail: AtomicBool,
    pub shrink: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        let dims = if self.shrink.load(Ordering::SeqCst) {
            DIMS / 2
        } else {
            DIMS
        };
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; dims];
                for w in words(text) {
                    v[(fnv1a(&w) % dims as u64) as usize] += 1.0;
                }
                // Keep every vector non-zero so cosine stays defined.
                v[0] += 0.01;
                v
            })
            .collect())
    }
}

/// A language model that follows the prompts mechanically.
///
/// Rewrite requests (system prompt asks for a standalone question) turn a
/// follow-up like "And Germany?" into the previous user question with its
/// last subject replaced. Answer requests return the context sentence that
/// shares the most words with the question, or "I don't know.".
#[derive(Default)]
pub struct ScriptedModel {
    pub fail_answers: AtomicBool,
    pub fail_rewrites: AtomicBool,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn rewrite_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| is_rewrite(m))
            .count()
    }

    /// Message lists sent for answer synthesis, oldest first.
    pub fn answer_requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !is_rewrite(m))
            .cloned()
            .collect()
    }
}

fn is_rewrite(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .map(|m| m.content.contains("standalone question"))
        .unwrap_or(false)
}

fn rewrite(messages: &[ChatMessage]) -> String {
    let users: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .collect();
    let latest = users.last().copied().unwrap_or_default();
    let Some(follow_up) = latest.strip_prefix("And ") else {
        return latest.to_string();
    };
    let subject = follow_up.trim_end_matches('?').trim();
    let previous = users
        .iter()
        .rev()
        .skip(1)
        .find(|u| !u.starts_with("And "))
        .copied()
        .unwrap_or_default();
    match previous.trim_end_matches('?').rsplit_once(' ') {
        Some((head, _)) => format!("{} {}?", head, subject),
        None => latest.to_string(),
    }
}

fn answer(messages: &[ChatMessage]) -> String {
    let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
    let question = messages.last().map(|m| m.content.as_str()).unwrap_or("");
    let context = system.split_once("\n\n").map(|(_, c)| c).unwrap_or("");
    let asked: HashSet<String> = words(question).into_iter().collect();

    let best = context
        .split(['.', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| (words(s).iter().filter(|w| asked.contains(*w)).count(), s))
        .filter(|(overlap, _)| *overlap > 0)
        .max_by_key(|(overlap, _)| *overlap);

    match best {
        Some((_, sentence)) => format!("{}.", sentence),
        None => "I don't know.".to_string(),
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if is_rewrite(messages) {
            if self.fail_rewrites.load(Ordering::SeqCst) {
                bail!("HTTP 503: model overloaded");
            }
            return Ok(rewrite(messages));
        }
        if self.fail_answers.load(Ordering::SeqCst) {
            bail!("HTTP 429: rate limited");
        }
        Ok(answer(messages))
    }
}

pub struct Harness {
    pub app: Arc<ChatApp>,
    pub embedder: Arc<HashEmbedder>,
    pub llm: Arc<ScriptedModel>,
}

pub fn harness() -> Harness {
    let embedder = Arc::new(HashEmbedder::default());
    let llm = Arc::new(ScriptedModel::default());
    let app = ChatApp::with_providers(&Config::default(), embedder.clone(), llm.clone());
    Harness {
        app: Arc::new(app),
        embedder,
        llm,
    }
}

pub fn text_doc(name: &str, body: &str) -> UploadedDocument {
    UploadedDocument {
        name: name.to_string(),
        content_type: Some("text/plain".to_string()),
        bytes: body.as_bytes().to_vec(),
    }
}

pub fn atlas() -> Vec<UploadedDocument> {
    vec![
        text_doc("france.txt", "The capital of France is Paris."),
        text_doc("germany.txt", "Berlin is the capital of Germany."),
        text_doc("rivers.txt", "The Danube flows through Vienna and Budapest."),
    ]
}

/// A one-page PDF showing `text` in Helvetica.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
