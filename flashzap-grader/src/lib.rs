//! Answer grading through a chat-completion model.
//!
//! The model is asked whether a candidate answer means the same thing as the
//! reference answer and must reply with exactly two lines:
//!
//! ```text
//! Result: Correct
//! Feedback: Nicely done.
//! ```
//!
//! Anything else is reported as [`OracleError::Malformed`]. Calls are never
//! retried here; the caller decides what to do with a failed grading.

use std::time::Duration;

use async_trait::async_trait;
use flashzap_core::{Grade, GradingOracle, OracleError, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SYSTEM_PROMPT: &str = "You are an AI assistant for a flashcard application. \
Your task is to evaluate a user's answer to a flashcard question.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct LlmGrader {
    config: GraderConfig,
    client: reqwest::Client,
}

impl LlmGrader {
    pub fn new(config: GraderConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| OracleError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    async fn complete(&self, api_key: &str, prompt: String) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let messages = [
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: prompt,
            },
        ];
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "grading request failed");
                OracleError::Unavailable(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "grading request rejected");
            return Err(OracleError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::Unavailable("empty response".into()))
    }
}

#[async_trait]
impl GradingOracle for LlmGrader {
    async fn grade(
        &self,
        question: &str,
        reference_answer: &str,
        candidate_answer: &str,
    ) -> Result<Verdict, OracleError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OracleError::NotConfigured("GEMINI_API_KEY"))?;

        let prompt = build_prompt(question, reference_answer, candidate_answer);
        let text = self.complete(api_key, prompt).await?;
        debug!(model = %self.config.model, "grader replied");
        parse_verdict(&text)
    }
}

pub fn build_prompt(question: &str, reference_answer: &str, candidate_answer: &str) -> String {
    format!(
        r#"The user was given the front of a flashcard and provided an answer. Compare their answer to the correct answer (the back of the flashcard) and determine if it is "Correct" or "Incorrect".

- Correct: the user's answer is semantically equivalent to the correct answer. Minor differences in phrasing, small typos, and different but equivalent date or number formats are acceptable.
- Incorrect: the user's answer is wrong or missing key information.

Provide a brief, encouraging, and helpful feedback message.

Question: "{question}"
Correct Answer: "{reference_answer}"
User's Answer: "{candidate_answer}"

Output format:
Result: [Correct/Incorrect]
Feedback: [Your feedback here]"#
    )
}

/// Reads the two-line reply format. Blank lines and surrounding whitespace are ignored.
pub fn parse_verdict(text: &str) -> Result<Verdict, OracleError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let (Some(result), Some(feedback)) = (lines.next(), lines.next()) else {
        return Err(OracleError::Malformed("expected a Result line and a Feedback line".into()));
    };
    let (Some(result), Some(feedback)) = (result.strip_prefix("Result:"), feedback.strip_prefix("Feedback:"))
    else {
        return Err(OracleError::Malformed("expected a Result line and a Feedback line".into()));
    };
    let result = result.trim();
    let grade = Grade::parse(result)
        .ok_or_else(|| OracleError::Malformed(format!("unexpected result: {result}")))?;
    Ok(Verdict {
        grade,
        feedback: feedback.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn parses_well_formed_reply() {
        let v = parse_verdict("Result: Correct\nFeedback: Spot on!").unwrap();
        assert_eq!(v.grade, Grade::Correct);
        assert_eq!(v.feedback, "Spot on!");

        let v = parse_verdict("\n  Result: Incorrect  \n\nFeedback:   The capital is Paris.\n").unwrap();
        assert_eq!(v.grade, Grade::Incorrect);
        assert_eq!(v.feedback, "The capital is Paris.");
    }

    #[test]
    fn rejects_malformed_replies() {
        for text in [
            "",
            "Result: Correct",
            "Feedback: nice\nResult: Correct",
            "Verdict: Correct\nFeedback: nice",
            "Result: Partially correct\nFeedback: close",
            "Result: correct\nFeedback: lower case is not accepted",
        ] {
            assert!(matches!(parse_verdict(text), Err(OracleError::Malformed(_))), "accepted {text:?}");
        }
    }

    #[test]
    fn prompt_carries_all_three_texts() {
        let p = build_prompt("Capital of France?", "Paris", "paris");
        assert!(p.contains("Question: \"Capital of France?\""));
        assert!(p.contains("Correct Answer: \"Paris\""));
        assert!(p.contains("User's Answer: \"paris\""));
        assert!(p.ends_with("Feedback: [Your feedback here]"));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let grader = LlmGrader::new(GraderConfig::default()).unwrap();
        assert!(!grader.is_available());
        let err = grader.grade("q", "a", "a").await.unwrap_err();
        assert_eq!(err, OracleError::NotConfigured("GEMINI_API_KEY"));
    }

    /// Serves one canned HTTP response and returns the endpoint base URL.
    async fn one_shot_server(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        });
        format!("http://{addr}/v1")
    }

    fn grader_for(endpoint: String) -> LlmGrader {
        LlmGrader::new(GraderConfig {
            api_key: Some("test-key".into()),
            endpoint,
            ..GraderConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn grades_through_chat_endpoint() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Result: Correct\nFeedback: Well done."}}]
        })
        .to_string();
        let endpoint = one_shot_server("200 OK", body).await;
        let v = grader_for(endpoint).grade("q", "Paris", "paris").await.unwrap();
        assert_eq!(v.grade, Grade::Correct);
        assert_eq!(v.feedback, "Well done.");
    }

    #[tokio::test]
    async fn http_error_is_unavailable() {
        let endpoint = one_shot_server("503 Service Unavailable", "{}".to_string()).await;
        let err = grader_for(endpoint).grade("q", "a", "a").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn empty_choices_is_unavailable() {
        let endpoint = one_shot_server("200 OK", r#"{"choices":[]}"#.to_string()).await;
        let err = grader_for(endpoint).grade("q", "a", "a").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Accepts the connection and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });

        let grader = LlmGrader::new(GraderConfig {
            api_key: Some("test-key".into()),
            endpoint: format!("http://{addr}"),
            timeout_secs: 1,
            ..GraderConfig::default()
        })
        .unwrap();
        let started = std::time::Instant::now();
        let err = grader.grade("q", "a", "a").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
