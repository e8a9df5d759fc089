use std::{
   fmt,
   hash::{Hash, Hasher},
   path::PathBuf,
};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzeError, Result};

// === Forge snapshots ===

/// Immutable snapshot of repository metadata fetched from the forge.
///
/// Identity is `(owner, name)`; every other field is informational and never
/// mutated after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Repository {
   pub owner:          String,
   pub name:           String,
   pub description:    Option<String>,
   pub stars:          u64,
   pub forks:          u64,
   pub open_issues:    u64,
   pub last_updated:   DateTime<Utc>,
   pub has_wiki:       bool,
   pub has_issues:     bool,
   pub default_branch: String,
   /// Size in kilobytes, as reported by the forge
   pub size:           u64,
}

impl Repository {
   pub fn full_name(&self) -> String {
      format!("{}/{}", self.owner, self.name)
   }
}

impl PartialEq for Repository {
   fn eq(&self, other: &Self) -> bool {
      self.owner == other.owner && self.name == other.name
   }
}

impl Eq for Repository {}

impl Hash for Repository {
   fn hash<H: Hasher>(&self, state: &mut H) {
      self.owner.hash(state);
      self.name.hash(state);
   }
}

/// A single commit from the forge's listing endpoint. Identity is the sha.
#[derive(Debug, Clone, Serialize)]
pub struct Commit {
   pub sha:     String,
   pub message: String,
   pub author:  String,
   pub date:    DateTime<Utc>,
}

impl Commit {
   pub fn new(
      sha: impl Into<String>,
      message: impl Into<String>,
      author: impl Into<String>,
      date: DateTime<Utc>,
   ) -> Result<Self> {
      let sha = sha.into();
      if sha.trim().is_empty() {
         return Err(AnalyzeError::BadInput("Commit sha cannot be empty".to_string()));
      }
      Ok(Self { sha, message: message.into(), author: author.into(), date })
   }

   /// First line of the commit message (the subject).
   pub fn subject(&self) -> &str {
      self.message.lines().next().unwrap_or("")
   }
}

impl PartialEq for Commit {
   fn eq(&self, other: &Self) -> bool {
      self.sha == other.sha
   }
}

impl Eq for Commit {}

impl Hash for Commit {
   fn hash<H: Hasher>(&self, state: &mut H) {
      self.sha.hash(state);
   }
}

// === Scores ===

/// The outcome of one metric calculator: a score in [0, 100] with its
/// aggregation weight in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
   pub name:        String,
   pub score:       f64,
   pub weight:      f64,
   pub description: String,
   pub details:     String,
}

impl MetricResult {
   /// Validated constructor: rejects out-of-range score/weight and empty
   /// names. Out-of-range values indicate a calculator bug, not bad data.
   pub fn new(
      name: impl Into<String>,
      score: f64,
      weight: f64,
      description: impl Into<String>,
      details: impl Into<String>,
   ) -> Result<Self> {
      let name = name.into();
      if name.trim().is_empty() {
         return Err(AnalyzeError::BadInput("Metric name cannot be empty".to_string()));
      }
      if !(0.0..=100.0).contains(&score) || !score.is_finite() {
         return Err(AnalyzeError::BadInput(format!(
            "Metric score {score} out of range [0, 100] for '{name}'"
         )));
      }
      if !(0.0..=1.0).contains(&weight) || !weight.is_finite() {
         return Err(AnalyzeError::BadInput(format!(
            "Metric weight {weight} out of range [0, 1] for '{name}'"
         )));
      }
      Ok(Self { name, score, weight, description: description.into(), details: details.into() })
   }

   pub fn weighted_score(&self) -> f64 {
      self.score * self.weight
   }
}

/// Categorical label derived purely from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
   Excellent,
   Good,
   Fair,
   Poor,
   Critical,
}

impl Rating {
   /// Banding: >=90 excellent, >=75 good, >=60 fair, >=40 poor, else critical.
   pub fn from_score(score: f64) -> Self {
      if score >= 90.0 {
         Self::Excellent
      } else if score >= 75.0 {
         Self::Good
      } else if score >= 60.0 {
         Self::Fair
      } else if score >= 40.0 {
         Self::Poor
      } else {
         Self::Critical
      }
   }

   pub const fn as_str(&self) -> &'static str {
      match self {
         Self::Excellent => "EXCELLENT",
         Self::Good => "GOOD",
         Self::Fair => "FAIR",
         Self::Poor => "POOR",
         Self::Critical => "CRITICAL",
      }
   }
}

impl fmt::Display for Rating {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// The finished analysis: metrics in fixed calculator order, the weighted
/// overall score, and an optional AI review.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
   pub repository_full_name: String,
   pub overall_score:        f64,
   /// Insertion order matches calculator execution order
   pub metrics:              IndexMap<String, MetricResult>,
   pub recommendation:       String,
   pub llm_analysis:         Option<LlmAnalysis>,
}

impl Report {
   pub fn rating(&self) -> Rating {
      Rating::from_score(self.overall_score)
   }
}

// === AI review sub-reports ===

/// Subscores use a 0-10 scale; lists stay short (model-enforced, clamped on
/// parse).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadmeInsight {
   pub clarity:               u8,
   pub completeness:          u8,
   pub newcomer_friendliness: u8,
   pub strengths:             Vec<String>,
   pub gaps:                  Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitInsight {
   pub clarity:         u8,
   pub consistency:     u8,
   pub informativeness: u8,
   pub observations:    Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityInsight {
   pub responsiveness: u8,
   pub helpfulness:    u8,
   pub tone:           u8,
   pub suggestions:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiRecommendation {
   pub area:       String,
   pub suggestion: String,
   /// Expected payoff on a 0-10 scale; recommendations sort by this,
   /// descending
   pub impact:     u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmAnalysis {
   pub readme:          ReadmeInsight,
   pub commits:         CommitInsight,
   pub community:       CommunityInsight,
   pub recommendations: Vec<AiRecommendation>,
   /// Confidence in [25, 95] derived from subscore coverage
   pub confidence:      f64,
   /// Total tokens billed across the three prompts (0 on full fallback)
   pub tokens_used:     u64,
}

// === CLI ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
   /// Human-readable multi-line report
   Text,
   /// Stable machine-readable JSON
   Json,
}

#[derive(Parser, Debug)]
#[command(version, about = "Compute a maintainability index for a hosted Git repository", long_about = None)]
pub struct Args {
   #[command(subcommand)]
   pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
   /// Analyze a repository and print its maintainability report
   Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
   /// Repository to analyze, as OWNER/REPO
   pub repo: String,

   /// Forge access token (falls back to the GITHUB_TOKEN environment
   /// variable)
   #[arg(long)]
   pub token: Option<String>,

   /// Output format
   #[arg(long, value_enum, default_value = "text")]
   pub format: Format,

   /// Enrich the report with an AI-powered review
   #[arg(long)]
   pub llm: bool,

   /// Path to config file (default: ~/.config/repo-maint/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,
}
