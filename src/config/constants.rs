// Project-wide constants
//
// Import via `use crate::config::constants::*;`.

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR_NAME: &str = ".matetutor";

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default maximum tokens per tutor reply.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Provider used when nothing selects one.
pub const DEFAULT_PROVIDER: &str = "gemini";

pub const VALID_PROVIDERS: [&str; 3] = ["gemini", "groq", "openai"];

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_PROVIDER: &str = "MATETUTOR_PROVIDER";
