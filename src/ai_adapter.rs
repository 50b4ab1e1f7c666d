// src/ai_adapter.rs
//! AI adapter: the reasoning capability behind the importance scorer.
//!
//! Split in two layers so the pipeline stays testable with deterministic
//! stand-ins: `ChatProvider` does the raw remote call (OpenAI-compatible
//! chat completions), `JudgeClient` turns one story into a `RawJudgment`.
//! Scores arrive unvalidated; clamping into `Judgment` is counted upstream.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::AiSettings;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Verdict as parsed from the capability's response, not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawJudgment {
    pub score: i64,
    pub summary: String,
    pub reasoning: String,
}

/// Validated verdict attached to a scored cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Judgment {
    pub score: u8,
    pub summary: String,
    pub reasoning: String,
}

impl RawJudgment {
    /// Clamp into the 0-10 contract. The bool reports whether clamping fired.
    pub fn into_judgment(self) -> (Judgment, bool) {
        let clamped = !(0..=10).contains(&self.score);
        let score = self.score.clamp(0, 10) as u8;
        (
            Judgment {
                score,
                summary: sanitize_line(&self.summary, 300),
                reasoning: sanitize_line(&self.reasoning, 600),
            },
            clamped,
        )
    }
}

/// Trait object used by the scorer (and tests).
pub trait JudgeClient: Send + Sync {
    /// Judge one story from its primary title and summary.
    fn judge<'a>(
        &'a self,
        title: &'a str,
        summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynJudge = Arc<dyn JudgeClient>;

/// True when `SCOUT_AI_MODE=mock` forces deterministic verdicts, e.g. in
/// integration tests or offline runs.
pub fn mock_mode() -> bool {
    std::env::var("SCOUT_AI_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
}

/// Factory: build a judge according to config and environment variables.
///
/// * If `SCOUT_AI_MODE=mock`, returns a deterministic canned judge.
/// * Else if `config.enabled == false`, returns a judge that fails per call.
/// * Else builds the configured provider.
pub fn build_judge_from_config(config: &AiSettings) -> DynJudge {
    if mock_mode() {
        return Arc::new(CannedJudge::neutral());
    }

    if !config.enabled {
        return Arc::new(DisabledJudge);
    }

    match config.provider.as_str() {
        "openai" => Arc::new(RemoteJudge::new(OpenAiChat::new(config))),
        "mock" => Arc::new(CannedJudge::neutral()),
        other => {
            tracing::warn!(target: "scout::score", provider = other, "unknown ai provider, judging disabled");
            Arc::new(DisabledJudge)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call. Separated so the judge and
/// the report evaluator can share one HTTP/auth/parsing layer.
pub trait ChatProvider: Send + Sync + 'static {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible chat completions provider.
pub struct OpenAiChat {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(cfg: &AiSettings) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("news-scout/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ChatProvider for OpenAiChat {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                bail!("missing api key for provider openai");
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: 0.2,
                max_tokens: 400,
            };

            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("chat completions send()")?;

            let status = resp.status();
            if !status.is_success() {
                bail!("chat completions returned {status}");
            }
            let body: Resp = resp.json().await.context("chat completions body")?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.trim())
                .unwrap_or("");
            if content.is_empty() {
                bail!("chat completions returned no content");
            }
            Ok(content.to_string())
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Judge built on a chat provider
// ------------------------------------------------------------

const JUDGE_SYSTEM_PROMPT: &str = "You are an assistant editor at a major news organization. Your sole task is to judge the importance of one incoming news story.\n\
\n\
INSTRUCTIONS:\n\
1. Focus on impact, novelty, and public interest. Ignore minor updates, trivial stories, and redundant information.\n\
2. Assign an importance score from 0-10 (10 is most important).\n\
3. Write a concise ONE-SENTENCE SUMMARY of the story's significance.\n\
4. Include brief reasoning for your score.\n\
5. Return ONLY a valid JSON object.\n\
\n\
JSON FORMAT:\n\
{\"score\": 8, \"summary\": \"A concise sentence explaining the story's impact and why it matters.\", \"reasoning\": \"Brief explanation of why this score was assigned\"}";

fn judge_user_prompt(title: &str, summary: &str) -> String {
    if summary.is_empty() {
        format!("Please judge the following story:\n\nTitle: {title}")
    } else {
        format!("Please judge the following story:\n\nTitle: {title}\nSummary: {summary}")
    }
}

/// Judge that prompts a chat provider and parses its JSON reply.
pub struct RemoteJudge<P: ChatProvider> {
    inner: P,
}

impl<P: ChatProvider> RemoteJudge<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    async fn judge_impl(&self, title: &str, summary: &str) -> Result<RawJudgment> {
        let user = judge_user_prompt(title, summary);
        let text = self.inner.complete(JUDGE_SYSTEM_PROMPT, &user).await?;
        parse_raw_judgment(&text)
    }
}

impl<P: ChatProvider> JudgeClient for RemoteJudge<P> {
    fn judge<'a>(
        &'a self,
        title: &'a str,
        summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>> {
        Box::pin(self.judge_impl(title, summary))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Fails every call; used when AI is disabled in config.
pub struct DisabledJudge;

impl JudgeClient for DisabledJudge {
    fn judge<'a>(
        &'a self,
        _title: &'a str,
        _summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>> {
        Box::pin(async { Err(anyhow!("ai is disabled in config")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Test doubles
// ------------------------------------------------------------

/// Returns one fixed verdict for every story; used by `SCOUT_AI_MODE=mock`.
#[derive(Clone)]
pub struct CannedJudge {
    pub fixed: RawJudgment,
}

impl CannedJudge {
    pub fn neutral() -> Self {
        Self {
            fixed: RawJudgment {
                score: 5,
                summary: "Mock summary (test mode).".to_string(),
                reasoning: "Mock reasoning (test mode).".to_string(),
            },
        }
    }
}

impl JudgeClient for CannedJudge {
    fn judge<'a>(
        &'a self,
        _title: &'a str,
        _summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Replays a scripted sequence of replies, one per call, and counts calls.
/// Replies are matched to calls in submission order.
pub struct ScriptedJudge {
    replies: Mutex<VecDeque<Result<RawJudgment, String>>>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new(replies: Vec<Result<RawJudgment, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JudgeClient for ScriptedJudge {
    fn judge<'a>(
        &'a self,
        _title: &'a str,
        _summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .map(|mut q| q.pop_front())
            .unwrap_or(None);
        Box::pin(async move {
            match next {
                Some(Ok(j)) => Ok(j),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Err(anyhow!("scripted judge exhausted")),
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Replies keyed by story title. Calls are concurrent in the scorer, so
/// title-keyed replies stay deterministic regardless of completion order.
pub struct TableJudge {
    replies: std::collections::HashMap<String, Result<RawJudgment, String>>,
    calls: AtomicUsize,
}

impl TableJudge {
    pub fn new(replies: Vec<(&str, Result<RawJudgment, String>)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|(t, r)| (t.to_string(), r))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Shorthand: every listed title gets an in-range score and stock text.
    pub fn with_scores(scores: Vec<(&str, i64)>) -> Self {
        Self::new(
            scores
                .into_iter()
                .map(|(t, s)| {
                    (
                        t,
                        Ok(RawJudgment {
                            score: s,
                            summary: format!("Summary for {t}."),
                            reasoning: "scripted".to_string(),
                        }),
                    )
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JudgeClient for TableJudge {
    fn judge<'a>(
        &'a self,
        title: &'a str,
        _summary: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RawJudgment>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.get(title).cloned();
        Box::pin(async move {
            match reply {
                Some(Ok(j)) => Ok(j),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Err(anyhow!("no scripted reply for title: {title}")),
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "table"
    }
}

/// Fixed-text chat provider, for evaluator tests and mock mode.
#[derive(Clone)]
pub struct MockChat {
    pub fixed: String,
}

impl ChatProvider for MockChat {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        _user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Response parsing
// ------------------------------------------------------------

/// Pull a JSON object out of a chat reply. Models wrap JSON in code fences
/// or prose often enough that plain `from_str` is not an option.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // Fenced block: ```json ... ``` or plain ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') && inner.ends_with('}') {
                return Some(inner);
            }
        }
    }

    // Last resort: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(trimmed[start..=end].trim())
    } else {
        None
    }
}

/// Parse a judge reply into a `RawJudgment`. Any shape violation is an error
/// so the scorer can record it as a per-cluster failure.
pub fn parse_raw_judgment(text: &str) -> Result<RawJudgment> {
    let json = extract_json_object(text)
        .ok_or_else(|| anyhow!("no JSON object in judge reply"))?;
    let parsed: RawJudgment =
        serde_json::from_str(json).context("malformed judgment JSON")?;
    if parsed.summary.trim().is_empty() {
        bail!("judgment missing summary");
    }
    Ok(parsed)
}

/// Single line, collapsed whitespace, capped at `max_chars` characters.
pub fn sanitize_line(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars));
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            c => c,
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.trim_end().to_string()
}
