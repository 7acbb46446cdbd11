use crate::constants::{
    CREATIVE_TEMPERATURE, GENERATION_ATTEMPTS, MAX_BODY_LENGTH, MAX_SUBJECT_LENGTH,
    RETRY_INITIAL_INTERVAL_MS, RETRY_MAX_INTERVAL_MS, STEADY_TEMPERATURE,
};
use crate::error::GenerationError;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// the external text generation service
pub trait TextGenerator: Send + Sync {
    fn complete(
        &self,
        system: &str,
        input: &str,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}

/// `TextGenerator` backed by an OpenAI-compatible chat completions endpoint
pub struct HttpGenerator {
    agent: ureq::Agent,
    api_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(api_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        }
    }

    fn request_body(&self, system: &str, input: &str, temperature: f32) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": input },
            ],
        })
    }
}

impl TextGenerator for HttpGenerator {
    fn complete(
        &self,
        system: &str,
        input: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let body = self.request_body(system, input, temperature);
        let result = self
            .agent
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body);

        let mut response = match result {
            Ok(response) => response,
            Err(ureq::Error::Timeout(_)) => return Err(GenerationError::Timeout(self.timeout_secs)),
            Err(e) => return Err(GenerationError::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(GenerationError::Service {
                status,
                body: body.trim().to_string(),
            });
        }

        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        first_choice(parsed)
    }
}

fn first_choice(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationError::InvalidResponse("no choices in response".to_string()))
}

/// how often and how patiently to retry transient generation failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: GENERATION_ATTEMPTS,
            initial_interval: Duration::from_millis(RETRY_INITIAL_INTERVAL_MS),
            max_interval: Duration::from_millis(RETRY_MAX_INTERVAL_MS),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// the fixed instruction sent ahead of every diff
pub fn system_instruction() -> String {
    format!(
        r#"
YOU ARE A COMMIT MESSAGE GENERATOR FOR A SINGLE FILE.

OUTPUT FORMAT:
<subject line>

- <one idea>
- <one idea>

RULES:
- subject: ≤{MAX_SUBJECT_LENGTH} characters, lowercase, no trailing period
- body: bullet lines, ≤{MAX_BODY_LENGTH} characters in total
- one idea per line
- no explanations, no preamble, no attribution
- describe the outcome, not the implementation
"#
    )
    .trim()
    .to_string()
}

/// pull a message out of model output, preferring a fenced block
fn extract_message(output: &str) -> String {
    let output = output.trim();
    if let Some(start) = output.find("```") {
        let after_first = &output[start + 3..];
        if let Some(end) = after_first.find("```") {
            let fenced = &after_first[..end];
            // drop an info string such as ```text
            let fenced = match fenced.split_once('\n') {
                Some((info, rest)) if !info.trim().contains(' ') => rest,
                _ => fenced,
            };
            return fenced.trim().to_string();
        }
    }
    output.to_string()
}

/// builds commit messages from diffs through a `TextGenerator`
pub struct MessageGenerator<G> {
    service: G,
    retry: RetryPolicy,
    show_prompt: bool,
}

impl<G: TextGenerator> MessageGenerator<G> {
    pub fn new(service: G, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            show_prompt: false,
        }
    }

    /// print the instruction before each request
    pub fn show_prompt(mut self, show: bool) -> Self {
        self.show_prompt = show;
        self
    }

    /// a trimmed commit message for `diff`
    ///
    /// `creative` trades determinism for variety; transient failures are
    /// retried with exponential backoff up to the policy's attempt limit.
    pub fn generate(&self, diff: &str, creative: bool) -> Result<String, GenerationError> {
        let system = system_instruction();
        let temperature = if creative {
            CREATIVE_TEMPERATURE
        } else {
            STEADY_TEMPERATURE
        };

        if self.show_prompt {
            use colored::Colorize;
            crate::info!("\n{}", system.dimmed());
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_interval(self.retry.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = self
                .service
                .complete(&system, diff, temperature)
                .map(|output| extract_message(&output))
                .and_then(|message| {
                    if message.is_empty() {
                        Err(GenerationError::EmptyResponse)
                    } else {
                        Ok(message)
                    }
                });

            match result {
                Ok(message) => {
                    debug!(attempts, creative, "generated message");
                    return Ok(message);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempts >= self.retry.max_attempts => {
                    return Err(GenerationError::RetriesExhausted {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    let wait = backoff.next_backoff().unwrap_or(self.retry.max_interval);
                    let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                    warn!(attempts, error = %e, wait_ms, "generation failed, retrying");
                    std::thread::sleep(wait);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGenerator;

    fn quick_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_steady_and_creative_temperatures() {
        let fake = FakeGenerator::replying("fix parser");
        let generator = MessageGenerator::new(fake.clone(), quick_retry(1));

        generator.generate("+a", false).unwrap();
        generator.generate("+a", true).unwrap();

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].temperature, STEADY_TEMPERATURE);
        assert_eq!(calls[1].temperature, CREATIVE_TEMPERATURE);
        assert_eq!(calls[0].input, "+a");
        assert!(calls[0].system.contains(&format!("≤{MAX_SUBJECT_LENGTH} characters")));
    }

    #[test]
    fn test_output_is_trimmed() {
        let fake = FakeGenerator::replying("  \n add parser\n\n- handle tokens \n\n");
        let generator = MessageGenerator::new(fake, quick_retry(1));
        assert_eq!(
            generator.generate("+a", false).unwrap(),
            "add parser\n\n- handle tokens"
        );
    }

    #[test]
    fn test_fenced_output_is_extracted() {
        assert_eq!(
            extract_message("here you go:\n```\nfix leak\n\n- free buffer\n```\nthanks"),
            "fix leak\n\n- free buffer"
        );
        assert_eq!(extract_message("```text\nadd docs\n```"), "add docs");
        assert_eq!(extract_message("plain subject"), "plain subject");
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let fake = FakeGenerator::scripted(vec![
            Err(GenerationError::Timeout(30)),
            Err(GenerationError::Service {
                status: 503,
                body: "busy".into(),
            }),
            Ok("update readme".into()),
        ]);
        let generator = MessageGenerator::new(fake.clone(), quick_retry(3));

        assert_eq!(generator.generate("+a", false).unwrap(), "update readme");
        assert_eq!(fake.calls().len(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let fake = FakeGenerator::scripted(vec![
            Err(GenerationError::Transport("refused".into())),
            Err(GenerationError::Transport("refused".into())),
            Ok("too late".into()),
        ]);
        let generator = MessageGenerator::new(fake.clone(), quick_retry(2));

        let err = generator.generate("+a", false).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::RetriesExhausted { attempts: 2, .. }
        ));
        assert_eq!(fake.calls().len(), 2);
    }

    #[test]
    fn test_permanent_failures_are_not_retried() {
        let fake = FakeGenerator::scripted(vec![Err(GenerationError::Service {
            status: 401,
            body: "bad key".into(),
        })]);
        let generator = MessageGenerator::new(fake.clone(), quick_retry(3));

        let err = generator.generate("+a", false).unwrap_err();
        assert!(matches!(err, GenerationError::Service { status: 401, .. }));
        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn test_empty_reply_counts_as_failure() {
        let fake = FakeGenerator::scripted(vec![Ok("   ".into()), Ok("```\n```".into())]);
        let generator = MessageGenerator::new(fake, quick_retry(2));
        assert!(matches!(
            generator.generate("+a", false).unwrap_err(),
            GenerationError::RetriesExhausted { .. }
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let http = HttpGenerator::new(
            "http://localhost:1/v1/chat/completions",
            "secret",
            "test-model",
            Duration::from_secs(5),
        );
        let body = http.request_body("sys", "diff", 1.0);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "diff");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"add tests"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "add tests");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            first_choice(empty),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unreachable_service_is_a_transport_error() {
        let http = HttpGenerator::new(
            "http://127.0.0.1:9/v1/chat/completions",
            "secret",
            "test-model",
            Duration::from_secs(2),
        );
        let err = http.complete("sys", "diff", 0.0).unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
