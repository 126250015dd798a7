use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You are an expert at writing informative, well-structured presentation \
     material in Markdown. Use Markdown formatting for a clear structure with headings, lists, \
     emphasis and other elements.";

const PROMPT_HEADER: &str = "Write a well-structured information page in Markdown based on the \
     context and main content of the presentation below.";

const FEEDBACK_INSTRUCTION: &str = "Work through all feedback and questions from the audience and \
     integrate them sensibly into the information page. Structure the page with Markdown headings, \
     lists and other formatting so it stays easy to scan.";

/// Inputs for one briefing.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub context: String,
    pub content: String,
    /// Feedback texts in insertion order (oldest first).
    pub feedback: Vec<String>,
}

#[derive(Debug)]
pub enum GenerationError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
    Malformed(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Transport(e) => write!(f, "request failed: {e}"),
            GenerationError::Status { status, body } => write!(f, "API returned {status}: {body}"),
            GenerationError::Malformed(e) => write!(f, "unexpected API response: {e}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Transport(e)
    }
}

/// Produces a Markdown briefing for a presentation.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Assemble the user prompt: header, context, content and, if any, the feedback block.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str("\n\n# Presentation context\n");
    prompt.push_str(&request.context);
    prompt.push_str("\n\n# Presentation content\n");
    prompt.push_str(&request.content);

    if !request.feedback.is_empty() {
        prompt.push_str("\n\n# Audience feedback and questions\n");
        for item in &request.feedback {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
        prompt.push('\n');
        prompt.push_str(FEEDBACK_INSTRUCTION);
    }

    prompt
}

/// Remove a code fence the model wrapped around the whole briefing.
///
/// Only an untagged or `markdown` opening fence is dropped, and a closing fence
/// only when it is left unpaired. Fenced blocks inside the briefing stay intact.
pub fn strip_outer_fence(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.first().is_some_and(|l| is_outer_opening_fence(l)) {
        lines.remove(0);
    }

    let fences = lines.iter().filter(|l| l.trim_start().starts_with("```")).count();
    if fences % 2 == 1 && lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

fn is_outer_opening_fence(line: &str) -> bool {
    line.trim().strip_prefix("```").is_some_and(|tag| {
        let tag = tag.trim();
        tag.is_empty() || tag.eq_ignore_ascii_case("markdown") || tag.eq_ignore_ascii_case("md")
    })
}

/// Fixed Markdown shown to readers in place of a briefing that could not be generated.
pub fn error_markdown(err: &GenerationError) -> String {
    format!("## Error\nThe AI content could not be generated: {err}")
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let prompt = build_prompt(request);
        log::debug!(
            "Requesting briefing from {} ({} prompt chars, {} feedback items)",
            self.settings.model,
            prompt.len(),
            request.feedback.len()
        );

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": self.settings.max_tokens,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| strip_outer_fence(&c))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GenerationError::Malformed("response contained no content".to_string()))
    }
}
