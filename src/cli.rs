use crate::constants::{
    DEFAULT_API_URL, DEFAULT_JOBS, DEFAULT_MODEL, GENERATION_ATTEMPTS, GENERATION_TIMEOUT_SECS,
};
use crate::session::ReadyPolicy;
use clap::Parser;
use std::path::PathBuf;

/// gita: stage, describe and commit changed files one at a time
#[derive(Parser, Debug)]
#[command(
    name = "gita",
    about,
    long_about = None,
    disable_version_flag = true
)]
pub struct Cli {
    /// repository to work in
    #[arg(short = 'C', long = "repo", value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,

    /// file holding the text generation api key
    /// [default: <config dir>/gita/api_key]
    #[arg(long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,

    /// chat completions endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// seconds to wait for each generation request
    #[arg(long, value_name = "SECS", default_value_t = GENERATION_TIMEOUT_SECS)]
    pub timeout: u64,

    /// attempts per message before falling back
    #[arg(long, value_name = "N", default_value_t = GENERATION_ATTEMPTS)]
    pub retries: u32,

    /// parallel generations while populating
    #[arg(long, short = 'j', value_name = "N", default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,

    /// whether `ready`/`unready` may exclude files
    #[arg(long, value_enum, default_value_t = ReadyPolicy::Fixed)]
    pub ready_policy: ReadyPolicy,

    /// print the instruction sent with each diff
    #[arg(long)]
    pub debug_prompt: bool,

    /// log diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// the key file, falling back to the per-user config directory
    pub fn key_path(&self) -> Option<PathBuf> {
        self.key_file
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("gita").join("api_key")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gita"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("."));
        assert_eq!(cli.api_url, DEFAULT_API_URL);
        assert_eq!(cli.model, DEFAULT_MODEL);
        assert_eq!(cli.timeout, GENERATION_TIMEOUT_SECS);
        assert_eq!(cli.retries, GENERATION_ATTEMPTS);
        assert_eq!(cli.jobs, DEFAULT_JOBS);
        assert_eq!(cli.ready_policy, ReadyPolicy::Fixed);
        assert!(!cli.debug_prompt);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "gita",
            "-C",
            "/tmp/work",
            "--key-file",
            "/tmp/key",
            "--ready-policy",
            "toggle",
            "-j",
            "8",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/work"));
        assert_eq!(cli.key_path(), Some(PathBuf::from("/tmp/key")));
        assert_eq!(cli.ready_policy, ReadyPolicy::Toggle);
        assert_eq!(cli.jobs, 8);
        assert!(cli.verbose);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["gita", "--ready-policy", "sometimes"]).is_err());
    }
}
