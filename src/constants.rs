// commit message
pub const MAX_SUBJECT_LENGTH: usize = 40;
pub const MAX_BODY_LENGTH: usize = 100;
pub const FALLBACK_MESSAGE: &str = "bug fixes and/or improvements";

// generation
pub const STEADY_TEMPERATURE: f32 = 0.0;
pub const CREATIVE_TEMPERATURE: f32 = 1.0;
pub const GENERATION_TIMEOUT_SECS: u64 = 30;
pub const GENERATION_ATTEMPTS: u32 = 3;
pub const RETRY_INITIAL_INTERVAL_MS: u64 = 500;
pub const RETRY_MAX_INTERVAL_MS: u64 = 8_000;
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_JOBS: usize = 4;

// diff
pub const DIFF_CONTEXT_LINES: u32 = 1;
pub const DIFF_SIZE_MAXIMUM_BYTES: usize = 16 * 1024;

// git
pub const GIT_TIMEOUT_SECS: u64 = 30;

// ui
pub const PROMPT: &str = "gita :> ";
pub const MAX_PATH_COLUMN: usize = 48;
