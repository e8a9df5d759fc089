use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
   #[error("Repository not found: {0}")]
   RepoNotFound(String),

   #[error("Forge rejected the request (HTTP {status}): check your access token")]
   Unauthorized { status: u16 },

   #[error("Forge rate limit exhausted (HTTP {status}): retry later or supply a token")]
   RateLimited { status: u16 },

   #[error("Listing too large to page (HTTP 422): {resource}")]
   ListingTooLarge { resource: String },

   #[error("Forge protocol error (HTTP {status}): {body}")]
   Protocol { status: u16, body: String },

   #[error("LLM request failed (HTTP {status}): {body}")]
   Llm { status: u16, body: String },

   #[error("Invalid value: {0}")]
   BadInput(String),

   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),

   #[error("HTTP error: {0}")]
   Http(#[from] reqwest::Error),

   #[error("{0}")]
   Other(String),
}

impl AnalyzeError {
   /// True for the 422 closed-issues trap that callers may downgrade to an
   /// estimate instead of failing the analysis.
   pub const fn is_too_large(&self) -> bool {
      matches!(self, Self::ListingTooLarge { .. })
   }
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;
