//! Layered settings.
//!
//! Sources, lowest precedence first: built-in defaults, `config.toml`,
//! `config.<env>.toml`, `APP_*` environment variables (`__` separates the
//! section from the key) and finally `OPENAI_API_KEY`.

use std::borrow::Cow;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

/// Keys whose values never leave the process through `settings`.
const SECRET_KEYS: &[&str] = &["api_key"];
const REDACTED: &str = "********";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub openai: OpenAiSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Lancedb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub uri: String,
    pub table: String,
    pub vector_dim: usize,
    pub write_batch_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Lancedb,
            uri: "~/.paperdb/lancedb".into(),
            table: "chunks".into(),
            vector_dim: 1536,
            write_batch_size: 256,
        }
    }
}

impl StoreSettings {
    pub fn resolved_uri(&self) -> PathBuf {
        expand_path(&self.uri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Openai,
    Local,
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub batch_size: usize,
    /// Directory holding `tokenizer.json`, `config.json` and the weights of
    /// the local model. Falls back to `APP_MODEL_DIR`/`MODEL_DIR`.
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Openai,
            model: "text-embedding-3-small".into(),
            batch_size: 64,
            model_dir: None,
            max_len: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self { model: "gpt-4o-mini".into(), temperature: 0.2, max_tokens: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self { api_key: None, base_url: "https://api.openai.com/v1".into(), timeout_secs: 60 }
    }
}

/// What the refiner does when the model output cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefineFallback {
    #[default]
    Fail,
    Question,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub candidate_k: usize,
    pub min_score: f32,
    pub max_chunks_per_query: usize,
    pub max_total_chunks: usize,
    pub concurrent: bool,
    pub refine_fallback: RefineFallback,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            candidate_k: 75,
            min_score: 0.5,
            max_chunks_per_query: 5,
            max_total_chunks: 20,
            concurrent: true,
            refine_fallback: RefineFallback::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub loader: String,
    pub chunking: ChunkingConfig,
    pub concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { loader: "lopdf".into(), chunking: ChunkingConfig::default(), concurrency: 1 }
    }
}

/// Where to read settings from. `None` fields use the defaults described in
/// the module docs.
#[derive(Debug, Clone, Default)]
pub struct SettingsSource {
    pub config_file: Option<PathBuf>,
    pub env: Option<String>,
}

impl SettingsSource {
    fn env_name(&self) -> String {
        self.env
            .clone()
            .or_else(|| std::env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "dev".to_string())
    }

    fn base_file(&self) -> PathBuf {
        self.config_file.clone().unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn env_file(&self) -> PathBuf {
        let base = self.base_file();
        let name = format!("config.{}.toml", canonical_env(&self.env_name()));
        match base.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        }
    }
}

fn canonical_env(name: &str) -> &str {
    match name {
        "development" => "dev",
        "production" => "prod",
        "testing" => "test",
        other => other,
    }
}

impl Settings {
    pub fn figment(source: &SettingsSource) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(source.base_file()))
            .merge(Toml::file(source.env_file()))
            .merge(Env::prefixed("APP_").split("__"))
            .merge(Env::raw().only(&["OPENAI_API_KEY"]).map(|_| "openai.api_key".into()))
    }

    pub fn load(source: &SettingsSource) -> Result<Self> {
        let settings: Settings = Self::figment(source)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Self-hosted OpenAI-compatible servers usually run without a key.
    pub fn requires_api_key(&self) -> bool {
        self.openai.base_url.contains("api.openai.com")
    }

    pub fn validate(&self) -> Result<()> {
        if self.requires_api_key()
            && self.openai.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::Config(
                "OPENAI_API_KEY (or openai.api_key) is required".into(),
            ));
        }
        if self.store.vector_dim == 0 {
            return Err(Error::Config("store.vector_dim must be positive".into()));
        }
        if self.store.write_batch_size == 0 {
            return Err(Error::Config("store.write_batch_size must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be positive".into()));
        }
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.min_score) {
            return Err(Error::Config(format!(
                "retrieval.min_score must be within [0, 1], got {}",
                r.min_score
            )));
        }
        if r.candidate_k == 0 || r.max_chunks_per_query == 0 || r.max_total_chunks == 0 {
            return Err(Error::Config(
                "retrieval.candidate_k, max_chunks_per_query and max_total_chunks must be positive"
                    .into(),
            ));
        }
        if r.max_chunks_per_query > r.candidate_k {
            return Err(Error::Config(
                "retrieval.max_chunks_per_query cannot exceed retrieval.candidate_k".into(),
            ));
        }
        if self.ingest.concurrency == 0 {
            return Err(Error::Config("ingest.concurrency must be at least 1".into()));
        }
        let c = &self.ingest.chunking;
        if c.max_tokens == 0 || !(0.0..1.0).contains(&c.overlap_percent) {
            return Err(Error::Config(
                "ingest.chunking needs max_tokens > 0 and overlap_percent in [0, 1)".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(Error::Config("completion.temperature must be within [0, 2]".into()));
        }
        Ok(())
    }

    /// Settings grouped by section, with secret values replaced.
    pub fn redacted_groups(&self) -> Result<Vec<SettingsGroup>> {
        let value = serde_json::to_value(self).map_err(|e| Error::Config(e.to_string()))?;
        let serde_json::Value::Object(sections) = value else {
            return Ok(Vec::new());
        };
        let mut groups = Vec::with_capacity(sections.len());
        for (name, section) in sections {
            let mut entries = Vec::new();
            flatten_into(&mut entries, "", &section);
            groups.push(SettingsGroup { name, entries });
        }
        Ok(groups)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsGroup {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

fn flatten_into(out: &mut Vec<(String, String)>, prefix: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                if SECRET_KEYS.contains(&key.as_str()) {
                    let shown = if inner.is_null() { "(unset)" } else { REDACTED };
                    out.push((path, shown.to_string()));
                } else {
                    flatten_into(out, &path, inner);
                }
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_json::Value::Null => out.push((prefix.to_string(), "(unset)".to_string())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// Expand a user-provided path string:
/// - leading `~` becomes the home directory
/// - `${VAR}` and `$VAR` are replaced from the environment
///
/// The result is not canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
