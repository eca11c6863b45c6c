use serde::{Deserialize, Serialize};
use sidebar_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant integrated into the browser. \
Provide concise, accurate, and helpful responses. When given page context, use it to provide more \
relevant answers.";

/// The closed set of backends a conversation can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    OnDevice,
    Ollama,
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::OnDevice,
        ProviderId::Ollama,
        ProviderId::Gemini,
        ProviderId::OpenAi,
        ProviderId::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OnDevice => "on_device",
            ProviderId::Ollama => "ollama",
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
        }
    }

    /// Human-readable vendor label used in status lines.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::OnDevice => "On-device",
            ProviderId::Ollama => "Ollama",
            ProviderId::Gemini => "Gemini",
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderId::OnDevice => "",
            ProviderId::Ollama => "http://localhost:11434",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderId::OpenAi => "https://api.openai.com/v1",
            ProviderId::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OnDevice => "gemini-nano",
            ProviderId::Ollama => "llama3.2",
            ProviderId::Gemini => "gemini-1.5-flash",
            ProviderId::OpenAi => "gpt-4o-mini",
            ProviderId::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    pub fn default_auth(&self) -> AuthMethod {
        match self {
            ProviderId::OnDevice | ProviderId::Ollama => AuthMethod::None,
            ProviderId::OpenAi => AuthMethod::Bearer,
            ProviderId::Gemini | ProviderId::Anthropic => AuthMethod::ApiKey,
        }
    }

    /// Environment variable consulted when no credential is configured.
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderId::OnDevice | ProviderId::Ollama => None,
            ProviderId::Gemini => Some("GEMINI_API_KEY"),
            ProviderId::OpenAi => Some("OPENAI_API_KEY"),
            ProviderId::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }

    pub fn requires_credential(&self) -> bool {
        self.credential_env_var().is_some()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_device" | "on-device" | "nano" | "gemini-nano" => Ok(ProviderId::OnDevice),
            "ollama" | "local" => Ok(ProviderId::Ollama),
            "gemini" => Ok(ProviderId::Gemini),
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            other => Err(Error::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// How the credential is attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Vendor-specific API key header.
    ApiKey,
    /// `Authorization: Bearer <token>`; also used for externally provisioned OAuth tokens.
    #[serde(alias = "oauth")]
    Bearer,
    None,
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api_key" | "api-key" | "apikey" => Ok(AuthMethod::ApiKey),
            "bearer" | "oauth" => Ok(AuthMethod::Bearer),
            "none" => Ok(AuthMethod::None),
            other => Err(Error::Config(format!("unknown auth method '{other}'"))),
        }
    }
}

/// Per-provider settings as persisted. Absent fields fall back to built-ins.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

impl ProviderConfig {
    /// Fill every field, reading the credential from the process environment
    /// when it is not configured.
    pub fn resolve(&self, id: ProviderId) -> ResolvedProviderConfig {
        self.resolve_with(id, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        &self,
        id: ProviderId,
        env: impl Fn(&str) -> Option<String>,
    ) -> ResolvedProviderConfig {
        let credential = non_empty(self.credential.clone())
            .or_else(|| id.credential_env_var().and_then(|key| non_empty(env(key))));

        ResolvedProviderConfig {
            id,
            endpoint: non_empty(self.endpoint.clone())
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| id.default_endpoint().to_string()),
            model: non_empty(self.model.clone()).unwrap_or_else(|| id.default_model().to_string()),
            credential,
            auth_method: self.auth_method.unwrap_or_else(|| id.default_auth()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A provider configuration with every default applied.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedProviderConfig {
    pub id: ProviderId,
    pub endpoint: String,
    pub model: String,
    pub credential: Option<String>,
    pub auth_method: AuthMethod,
}

impl fmt::Debug for ResolvedProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProviderConfig")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

impl ResolvedProviderConfig {
    /// Credential or `AuthMissing` when the provider needs one.
    pub fn require_credential(&self) -> Result<&str> {
        match self.credential.as_deref() {
            Some(c) => Ok(c),
            None => Err(Error::AuthMissing(match self.id.credential_env_var() {
                Some(var) => format!("no credential configured for {} (set {var})", self.id),
                None => format!("no credential configured for {}", self.id),
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Page text longer than this is cut before it is embedded in a prompt.
    pub max_context_chars: usize,
    /// Upper bound handed to the page extractor.
    pub extraction_max_chars: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_context_chars: 8_000,
            extraction_max_chars: 10_000,
            cache_ttl_secs: 30,
            cache_capacity: 20,
        }
    }
}

impl ContextSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub probe_secs: u64,
    pub completion_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe_secs: 10,
            completion_secs: 60,
        }
    }
}

impl TimeoutSettings {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn completion(&self) -> Duration {
        Duration::from_secs(self.completion_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Everything the conversation engine needs to (re)initialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub active_provider: ProviderId,
    pub providers: BTreeMap<ProviderId, ProviderConfig>,
    pub context: ContextSettings,
    pub timeouts: TimeoutSettings,
    pub generation: GenerationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_provider: ProviderId::OnDevice,
            providers: BTreeMap::new(),
            context: ContextSettings::default(),
            timeouts: TimeoutSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl Settings {
    pub fn provider_config(&self, id: ProviderId) -> ProviderConfig {
        self.providers.get(&id).cloned().unwrap_or_default()
    }

    pub fn active_config(&self) -> ResolvedProviderConfig {
        self.provider_config(self.active_provider)
            .resolve(self.active_provider)
    }

    /// A copy of these settings with `id` active and configured by `config`.
    pub fn with_provider(&self, id: ProviderId, config: ProviderConfig) -> Settings {
        let mut next = self.clone();
        next.active_provider = id;
        next.providers.insert(id, config);
        next
    }
}
