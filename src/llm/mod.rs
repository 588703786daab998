pub mod openai;
pub mod provider;
pub mod types;

pub use provider::{LlmError, LlmProvider};
pub use types::{ChatMessage, ChatRequest};

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Warning shown on startup and on both pages when the key is absent.
pub const MISSING_CREDENTIAL_WARNING: &str = "OpenAI API Key is missing! Set it as an environment variable: export OPENAI_API_KEY=<your OpenAI API key>";

/// Read the API key from the environment. Blank values count as missing.
pub fn credential_from_env() -> Option<String> {
    credential_from(std::env::var(API_KEY_ENV).ok().as_deref())
}

fn credential_from(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
