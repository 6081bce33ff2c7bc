//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use denexus_core::{
    ChatMessage, ChatSession, CompletionClient, CompletionError, Embedder, EmbeddingError,
    Generator, SessionSettings, SourceSchema,
};

pub const DIMS: usize = 256;

/// Bag-of-words embedder: each lowercase alphanumeric token bumps one hashed bucket.
pub struct HashEmbedder {
    model: String,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl HashEmbedder {
    pub fn new(model: &str) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a(&token.to_lowercase()) % DIMS as u64) as usize;
        v[bucket] += 1.0;
    }
    // keep every vector non-zero
    v[0] += 0.01;
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Other("embedding service unavailable".into()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }
}

/// Completion client that records every request and replies from a script.
pub struct RecordingClient {
    reply: Mutex<Result<Vec<String>, String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingClient {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Ok(vec![text.to_string()])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with(&self, message: &str) {
        *self.reply.lock().unwrap() = Err(message.to_string());
    }

    pub fn reply_with(&self, text: &str) {
        *self.reply.lock().unwrap() = Ok(vec![text.to_string()]);
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for RecordingClient {
    async fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<String>, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .map_err(CompletionError::Other)
    }
}

/// Writes `<dir>/<source>_cleaned.csv` with a single `text` column.
pub fn write_table(dir: &Path, source: &str, rows: &[&str]) {
    let mut body = String::from("text\n");
    for row in rows {
        body.push('"');
        body.push_str(&row.replace('"', "\"\""));
        body.push_str("\"\n");
    }
    std::fs::write(dir.join(format!("{source}_cleaned.csv")), body).unwrap();
}

pub fn settings(dir: &Path, sources: &[&str], top_k: usize) -> SessionSettings {
    SessionSettings {
        sources: sources
            .iter()
            .map(|s| SourceSchema::new(*s, ["text"]))
            .collect(),
        data_dir: dir.to_path_buf(),
        index_path: dir.join("index"),
        top_k,
    }
}

pub fn session(
    settings: SessionSettings,
    embedder: Arc<HashEmbedder>,
    client: Arc<RecordingClient>,
) -> ChatSession {
    ChatSession::new(settings, embedder, Generator::new(client, "test-model"))
}
