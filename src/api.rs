//! LLM chat-completion client.
//!
//! One blocking POST per prompt against an OpenAI-compatible endpoint.
//! Response text passes through the mojibake repair before it reaches any
//! caller; token usage defaults to zero when the provider omits it.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::{
   config::LlmConfig,
   error::{AnalyzeError, Result},
   normalization::repair_mojibake,
};

/// One completed prompt: repaired content plus billed tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
   pub content:     String,
   pub tokens_used: u64,
}

#[derive(Debug, Serialize)]
struct Message {
   role:    String,
   content: String,
}

#[derive(Debug, Serialize)]
struct ApiRequest {
   model:       String,
   temperature: f32,
   max_tokens:  u32,
   messages:    Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
   choices: Vec<Choice>,
   #[serde(default)]
   usage:   Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
   message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
   #[serde(default)]
   content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
   #[serde(default)]
   total_tokens: u64,
}

pub struct LlmClient {
   http:   reqwest::blocking::Client,
   config: LlmConfig,
}

impl LlmClient {
   pub fn new(config: LlmConfig) -> Self {
      let http = reqwest::blocking::Client::builder()
         .timeout(Duration::from_secs(config.request_timeout_secs))
         .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
         .build()
         .expect("Failed to build HTTP client");

      Self { http, config }
   }

   /// Send one prompt and return the model's reply.
   ///
   /// Every failure mode here (transport, HTTP status, response shape) is an
   /// `AnalyzeError` the review layer downgrades to a fallback; nothing in
   /// this client retries.
   pub fn analyze(&self, prompt: &str) -> Result<Completion> {
      let request = ApiRequest {
         model:       self.config.model.clone(),
         temperature: self.config.temperature,
         max_tokens:  self.config.max_tokens,
         messages:    vec![Message { role: "user".to_string(), content: prompt.to_string() }],
      };

      let url = format!("{}/chat/completions", self.config.api_base_url.trim_end_matches('/'));
      let mut request_builder = self
         .http
         .post(url)
         .header("content-type", "application/json")
         .header("HTTP-Referer", &self.config.referer)
         .header("X-Title", &self.config.title);

      if let Some(api_key) = &self.config.api_key {
         request_builder = request_builder.header(AUTHORIZATION, format!("Bearer {api_key}"));
      }

      let response = request_builder.json(&request).send()?;
      let status = response.status();
      let body = response.text()?;

      if !status.is_success() {
         return Err(AnalyzeError::Llm { status: status.as_u16(), body: snippet(&body, 300) });
      }

      let parsed: ApiResponse = serde_json::from_str(&body)?;
      let content = parsed
         .choices
         .into_iter()
         .next()
         .and_then(|choice| choice.message.content)
         .ok_or_else(|| AnalyzeError::Other("No content in LLM response".to_string()))?;

      let tokens_used = parsed.usage.map_or(0, |u| u.total_tokens);

      Ok(Completion { content: repair_mojibake(&content), tokens_used })
   }
}

fn snippet(body: &str, limit: usize) -> String {
   let trimmed = body.trim();
   if trimmed.len() <= limit {
      return trimmed.to_string();
   }
   let mut cut = trimmed.to_string();
   cut.truncate(limit);
   cut.push_str("...");
   cut
}
