use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    Real,
    Fake,
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    Internal,
    External,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_ai_provider")]
    pub ai_provider: AiProviderKind,
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
    /// Optional shared secret; when set, every protected route requires it
    /// in `X-API-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub debug: bool,

    // Retrieval + answering tunables
    #[serde(default = "default_max_chunks_per_query")]
    pub max_chunks_per_query: usize,
    #[serde(default = "default_chunk_char_target")]
    pub chunk_char_target: usize,
    #[serde(default = "default_chunk_char_overlap")]
    pub chunk_char_overlap: usize,
    #[serde(default = "default_true")]
    pub rerank_enabled: bool,
    #[serde(default = "default_rerank_candidates")]
    pub rerank_candidates: usize,
    #[serde(default = "default_rerank_snippet_chars")]
    pub rerank_snippet_chars: usize,
    #[serde(default = "default_true")]
    pub mmr_enabled: bool,
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
    #[serde(default = "default_mmr_candidates")]
    pub mmr_candidates: usize,
    #[serde(default)]
    pub per_source_retrieval_limit: Option<usize>,

    // Embedding
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    // Ingestion caps
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: usize,
    #[serde(default = "default_max_pdf_pages")]
    pub max_pdf_pages: usize,
    #[serde(default = "default_max_url_bytes")]
    pub max_url_bytes: usize,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
    /// Hosts URL ingestion may fetch from. Empty means any public host.
    #[serde(default)]
    pub url_allowlist: Vec<String>,

    // Provider resilience
    #[serde(default = "default_provider_max_retries")]
    pub provider_max_retries: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    // API tier
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rate_limit_backend")]
    pub rate_limit_backend: RateLimitBackend,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    // Worker tier
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_worker_lease_secs")]
    pub worker_lease_secs: u64,
    /// Hard per-task ceiling; a task still running past it is cancelled and
    /// fails terminally.
    #[serde(default = "default_worker_task_time_limit_secs")]
    pub worker_task_time_limit_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_ai_provider() -> AiProviderKind {
    AiProviderKind::Real
}

fn default_storage_root() -> String {
    "./data".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_max_chunks_per_query() -> usize {
    8
}

const fn default_chunk_char_target() -> usize {
    5000
}

const fn default_chunk_char_overlap() -> usize {
    800
}

const fn default_rerank_candidates() -> usize {
    30
}

const fn default_rerank_snippet_chars() -> usize {
    900
}

const fn default_mmr_lambda() -> f32 {
    0.7
}

const fn default_mmr_candidates() -> usize {
    30
}

const fn default_embed_dim() -> usize {
    1536
}

const fn default_embed_batch_size() -> usize {
    64
}

const fn default_max_pdf_bytes() -> usize {
    25_000_000
}

const fn default_max_pdf_pages() -> usize {
    300
}

const fn default_max_url_bytes() -> usize {
    2_000_000
}

const fn default_max_text_bytes() -> usize {
    2_000_000
}

const fn default_provider_max_retries() -> usize {
    3
}

const fn default_provider_timeout_secs() -> u64 {
    30
}

const fn default_request_timeout_secs() -> u64 {
    60
}

const fn default_rate_limit_backend() -> RateLimitBackend {
    RateLimitBackend::Internal
}

const fn default_rate_limit_per_minute() -> u32 {
    120
}

const fn default_worker_concurrency() -> usize {
    4
}

const fn default_worker_lease_secs() -> u64 {
    120
}

const fn default_worker_task_time_limit_secs() -> u64 {
    600
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

impl AppConfig {
    /// A config suitable for tests: in-memory database, fake provider, and a
    /// caller-supplied storage root.
    pub fn for_tests(storage_root: &str) -> Self {
        Self {
            surrealdb_address: "mem://".into(),
            surrealdb_username: "root".into(),
            surrealdb_password: "root".into(),
            surrealdb_namespace: "test_ns".into(),
            surrealdb_database: "test_db".into(),
            http_port: 0,
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            ai_provider: AiProviderKind::Fake,
            storage_root: storage_root.to_string(),
            api_key: None,
            debug: false,
            max_chunks_per_query: default_max_chunks_per_query(),
            chunk_char_target: default_chunk_char_target(),
            chunk_char_overlap: default_chunk_char_overlap(),
            rerank_enabled: true,
            rerank_candidates: default_rerank_candidates(),
            rerank_snippet_chars: default_rerank_snippet_chars(),
            mmr_enabled: true,
            mmr_lambda: default_mmr_lambda(),
            mmr_candidates: default_mmr_candidates(),
            per_source_retrieval_limit: None,
            embed_dim: 64,
            embed_batch_size: default_embed_batch_size(),
            max_pdf_bytes: default_max_pdf_bytes(),
            max_pdf_pages: default_max_pdf_pages(),
            max_url_bytes: default_max_url_bytes(),
            max_text_bytes: default_max_text_bytes(),
            url_allowlist: Vec::new(),
            provider_max_retries: default_provider_max_retries(),
            provider_timeout_secs: default_provider_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_backend: RateLimitBackend::External,
            rate_limit_per_minute: default_rate_limit_per_minute(),
            worker_concurrency: 1,
            worker_lease_secs: default_worker_lease_secs(),
            worker_task_time_limit_secs: default_worker_task_time_limit_secs(),
        }
    }
}
