//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SearchQuery;

/// Environment variable that overrides `delivery.webhook_url`.
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to search for
    #[serde(default)]
    pub search: SearchConfig,

    /// Retry, throttling and concurrency settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Term sets for the rule pipeline
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Fingerprint settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Webhook and message formatting
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Listing sources
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            if !url.trim().is_empty() {
                self.delivery.webhook_url = Some(url.trim().to_string());
            }
        }
    }

    /// The search query every source runs with.
    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(&self.search.term, &self.search.locality)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.search.term.trim().is_empty() {
            return Err(AppError::validation("search.term is empty"));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_attempts == 0 {
            return Err(AppError::validation("fetch.max_attempts must be > 0"));
        }
        if self.fetch.base_delay_ms == 0 {
            return Err(AppError::validation("fetch.base_delay_ms must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.classifier.domain.is_empty() && self.classifier.strong_signal.is_empty() {
            return Err(AppError::validation("classifier has no domain terms"));
        }
        for pattern in &self.classifier.noise_patterns {
            regex::Regex::new(pattern)?;
        }
        self.delivery.validate()?;
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            dedup: DedupConfig::default(),
            delivery: DeliveryConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// Search term and locality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::term")]
    pub term: String,

    #[serde(default = "defaults::locality")]
    pub locality: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            term: defaults::term(),
            locality: defaults::locality(),
        }
    }
}

/// How sources are scheduled within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Sequential,
    Concurrent,
}

/// HTTP and retry behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Total adapter invocations per source and run
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Random extra delay added on top of `base_delay_ms`
    #[serde(default = "defaults::jitter")]
    pub jitter_ms: u64,

    #[serde(default)]
    pub mode: FetchMode,

    /// Worker pool size in concurrent mode
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum seconds between two invocations of the same source
    #[serde(default)]
    pub min_interval_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            jitter_ms: defaults::jitter(),
            mode: FetchMode::default(),
            max_concurrent: defaults::max_concurrent(),
            min_interval_secs: 0,
        }
    }
}

/// Term sets for the classification rule pipeline.
///
/// Terms are matched case-insensitively against a folded title in which
/// punctuation is replaced by spaces and both ends are padded with a space,
/// so `" ti "` only matches the whole word while `"desenvolv"` is a prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "defaults::min_title_chars")]
    pub min_title_chars: usize,

    /// Regexes for UI text scraped by mistake
    #[serde(default = "defaults::noise_patterns")]
    pub noise_patterns: Vec<String>,

    /// Terms that override an exclusion match
    #[serde(default = "defaults::strong_signal")]
    pub strong_signal: Vec<String>,

    /// Terms of which at least one must be present
    #[serde(default = "defaults::domain")]
    pub domain: Vec<String>,

    /// Professions outside the target domain
    #[serde(default = "defaults::exclusion")]
    pub exclusion: Vec<String>,

    /// Excluded experience levels
    #[serde(default = "defaults::seniority")]
    pub seniority: Vec<String>,

    #[serde(default = "defaults::locality_allow")]
    pub locality_allow: Vec<String>,

    #[serde(default = "defaults::locality_deny")]
    pub locality_deny: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_title_chars: defaults::min_title_chars(),
            noise_patterns: defaults::noise_patterns(),
            strong_signal: defaults::strong_signal(),
            domain: defaults::domain(),
            exclusion: defaults::exclusion(),
            seniority: defaults::seniority(),
            locality_allow: defaults::locality_allow(),
            locality_deny: defaults::locality_deny(),
        }
    }
}

/// Fingerprint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Lowercase titles before hashing
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Webhook and message formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Discord webhook; `DISCORD_WEBHOOK_URL` takes precedence
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "defaults::delivery_timeout")]
    pub timeout_secs: u64,

    /// Maximum characters per message
    #[serde(default = "defaults::hard_limit")]
    pub hard_limit: usize,

    /// First batch header; `{count}` is the number of postings
    #[serde(default = "defaults::header")]
    pub header: String,

    /// Header of every following batch; `{page}` is the 1-based batch number
    #[serde(default = "defaults::continuation_header")]
    pub continuation_header: String,

    /// Posting block; `{title}`, `{url}`, `{source}`
    #[serde(default = "defaults::block")]
    pub block: String,

    #[serde(default = "defaults::truncation_marker")]
    pub truncation_marker: String,

    #[serde(default = "defaults::no_results_message")]
    pub no_results_message: String,

    /// Delay before the single delivery retry
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl DeliveryConfig {
    fn validate(&self) -> Result<()> {
        if self.hard_limit == 0 {
            return Err(AppError::validation("delivery.hard_limit must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::validation("delivery.timeout_secs must be > 0"));
        }
        self.check_fits(self.hard_limit)
    }

    /// Check that headers and the no-results message fit within `limit`.
    pub fn check_fits(&self, limit: usize) -> Result<()> {
        // Headers and the marker must leave room for at least some posting text.
        let widest_header = self
            .header
            .replace("{count}", "9999")
            .chars()
            .count()
            .max(self.continuation_header.replace("{page}", "9999").chars().count());
        if widest_header + self.truncation_marker.chars().count() >= limit {
            return Err(AppError::validation(format!(
                "delivery headers do not fit within {limit} chars"
            )));
        }
        if self.no_results_message.chars().count() > limit {
            return Err(AppError::validation(format!(
                "delivery.no_results_message exceeds {limit} chars"
            )));
        }
        Ok(())
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: defaults::delivery_timeout(),
            hard_limit: defaults::hard_limit(),
            header: defaults::header(),
            continuation_header: defaults::continuation_header(),
            block: defaults::block(),
            truncation_marker: defaults::truncation_marker(),
            no_results_message: defaults::no_results_message(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// A listing site scraped through CSS selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source identifier used in logs and statistics
    pub id: String,

    /// Search URL; `{term}` and `{locality}` are substituted
    pub url_template: String,

    /// Separator that replaces spaces in substituted values
    #[serde(default = "defaults::space")]
    pub space: String,

    /// Candidate selectors, first one with matches wins
    pub selectors: Vec<String>,

    /// HTML attribute holding the link
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Keep only the first N matches
    #[serde(default = "defaults::limit")]
    pub limit: usize,

    /// Clip titles to this many characters
    #[serde(default)]
    pub max_title_chars: Option<usize>,
}

impl SourceConfig {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("source id is empty"));
        }
        if self.selectors.is_empty() {
            return Err(AppError::validation(format!(
                "source '{}' has no selectors",
                self.id
            )));
        }
        if self.limit == 0 {
            return Err(AppError::validation(format!(
                "source '{}' limit must be > 0",
                self.id
            )));
        }
        Ok(())
    }
}

mod defaults {
    use super::SourceConfig;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Search defaults
    pub fn term() -> String {
        "desenvolvedor programador TI".into()
    }
    pub fn locality() -> String {
        "Salvador, BA".into()
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        5_000
    }
    pub fn jitter() -> u64 {
        2_000
    }
    pub fn max_concurrent() -> usize {
        2
    }

    // Classifier defaults
    pub fn min_title_chars() -> usize {
        5
    }
    pub fn noise_patterns() -> Vec<String> {
        strings(&[
            r"(?i)cookies?",
            r"(?i)^\s*(entrar|login|log in|sign in|fazer login|cadastre-se|criar conta)\s*$",
            r"(?i)^\s*(pr[oó]xim[oa]|anterior|next|previous|ver mais|carregar mais)\s*$",
            r"(?i)^\s*p[aá]gina\s+\d+",
            r"(?i)^\s*\d+\s*$",
        ])
    }
    pub fn strong_signal() -> Vec<String> {
        strings(&[
            " ti ",
            "tecnologia",
            "technology",
            "software",
            "desenvolvedor",
            "desenvolvimento de sistemas",
            "developer",
            "programador",
            "programação",
        ])
    }
    pub fn domain() -> Vec<String> {
        strings(&[
            " ti ",
            " it ",
            "tecnologia",
            "technology",
            "desenvolv",
            "developer",
            "programad",
            "software",
            "sistemas",
            "suporte técnico",
            "infraestrutura",
            "redes",
            "dados",
            " data ",
            "devops",
            " qa ",
            "testes",
            "front end",
            "back end",
            "fullstack",
            "full stack",
            "web",
            "python",
            "java",
            "cloud",
            "segurança da informação",
            "help desk",
            "helpdesk",
        ])
    }
    pub fn exclusion() -> Vec<String> {
        strings(&[
            "comercial",
            "vendas",
            "vendedor",
            "marketing",
            "contábil",
            "contabilidade",
            "financeiro",
            "jurídico",
            "advogado",
            "enfermagem",
            "enfermeiro",
            "médico",
            "recursos humanos",
            " rh ",
            "logística",
            "motorista",
            "cozinha",
            "atendente",
            "recepcionista",
            "telemarketing",
        ])
    }
    pub fn seniority() -> Vec<String> {
        strings(&[
            "sênior",
            "senior",
            " sr ",
            "pleno",
            " pl ",
            "especialista",
            "lead",
            "líder",
            "lider",
            "coordenador",
            "gerente",
            "manager",
            "head",
            "diretor",
            "arquiteto",
        ])
    }
    pub fn locality_allow() -> Vec<String> {
        strings(&[
            "salvador",
            "bahia",
            " ba ",
            "remoto",
            "remote",
            "home office",
            "anywhere",
        ])
    }
    pub fn locality_deny() -> Vec<String> {
        strings(&[
            "são paulo",
            "sao paulo",
            "rio de janeiro",
            "belo horizonte",
            "curitiba",
            "porto alegre",
            "recife",
            "fortaleza",
            "brasília",
            "brasilia",
            "florianópolis",
            "campinas",
        ])
    }

    // Delivery defaults
    pub fn delivery_timeout() -> u64 {
        10
    }
    pub fn hard_limit() -> usize {
        2_000
    }
    pub fn header() -> String {
        "🎯 **Vagas de TI Encontradas** ({count})\n\n".into()
    }
    pub fn continuation_header() -> String {
        "🎯 **Vagas de TI (parte {page})**\n\n".into()
    }
    pub fn block() -> String {
        "**{title}**\n{url}\n\n".into()
    }
    pub fn truncation_marker() -> String {
        "… [truncado]\n\n".into()
    }
    pub fn no_results_message() -> String {
        "📭 Nenhuma vaga nova encontrada.".into()
    }
    pub fn retry_delay() -> u64 {
        2_000
    }

    // Source defaults
    pub fn space() -> String {
        "+".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn limit() -> usize {
        5
    }
    pub fn sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                id: "indeed".to_string(),
                url_template: "https://br.indeed.com/jobs?q={term}&l={locality}".to_string(),
                space: "+".to_string(),
                selectors: strings(&["a.jcs-JobTitle"]),
                link_attr: link_attr(),
                limit: limit(),
                max_title_chars: None,
            },
            SourceConfig {
                id: "glassdoor".to_string(),
                url_template:
                    "https://www.glassdoor.com.br/Vaga/{term}-vagas-{locality}-SRCH_KO0,25.htm"
                        .to_string(),
                space: "-".to_string(),
                selectors: strings(&["[data-test='job-link']", "a.jobLink", ".job-title"]),
                link_attr: link_attr(),
                limit: limit(),
                max_title_chars: Some(80),
            },
        ]
    }
}
