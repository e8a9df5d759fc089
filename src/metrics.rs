//! The six maintainability signals.
//!
//! Each calculator consumes the forge client and produces one validated
//! `MetricResult`. The set is closed; `all_calculators` fixes the execution
//! and report order.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::{
   error::Result,
   github::GithubClient,
   types::MetricResult,
};

/// Uniform capability of one signal: a stable name, an aggregation weight,
/// and a calculation against the forge.
pub trait MetricCalculator: Send + Sync {
   fn name(&self) -> &'static str;
   fn weight(&self) -> f64;
   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult>;
}

/// The six calculators in report order: Documentation, Commit Quality,
/// Activity, Issue Management, Community, Branch Management.
pub fn all_calculators() -> Vec<Box<dyn MetricCalculator>> {
   vec![
      Box::new(Documentation),
      Box::new(CommitQuality),
      Box::new(Activity),
      Box::new(IssueManagement),
      Box::new(Community),
      Box::new(BranchManagement),
   ]
}

// === Documentation ===

const DOC_FILES: &[&str] = &[
   "README.md",
   "CONTRIBUTING.md",
   "LICENSE",
   "CODE_OF_CONDUCT.md",
   "CHANGELOG.md",
];

pub struct Documentation;

impl MetricCalculator for Documentation {
   fn name(&self) -> &'static str {
      "Documentation"
   }

   fn weight(&self) -> f64 {
      0.20
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let mut found = Vec::new();
      let mut missing = Vec::new();

      for path in DOC_FILES {
         if forge.has_file(owner, name, path)? {
            found.push(*path);
         } else {
            missing.push(*path);
         }
      }

      let score = 100.0 * found.len() as f64 / DOC_FILES.len() as f64;
      let details = format!(
         "Found: [{}]; Missing: [{}]",
         found.join(", "),
         missing.join(", ")
      );

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Presence of standard project documentation files",
         details,
      )
   }
}

// === Commit Quality ===

static CONVENTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?i)^(feat|fix|docs|style|refactor|test|chore|perf|ci|build)(\(.+\))?:.+")
      .expect("Conventional commit pattern must compile")
});

/// Judge one commit subject line.
///
/// Anything under 10 characters is bad outright. Conventional-commit
/// subjects pass from there. Otherwise a subject passes only when it is at
/// least 20 characters, starts uppercase, is not a merge or update commit,
/// and carries no wip marker.
fn is_good_subject(subject: &str) -> bool {
   let subject = subject.trim();

   if subject.chars().count() < 10 {
      return false;
   }
   if CONVENTIONAL_RE.is_match(subject) {
      return true;
   }
   if subject.chars().count() < 20 {
      return false;
   }
   if !subject.chars().next().is_some_and(char::is_uppercase) {
      return false;
   }

   let lower = subject.to_lowercase();
   if lower.starts_with("merge") || lower.starts_with("update") {
      return false;
   }
   !lower.contains("wip")
}

pub struct CommitQuality;

impl MetricCalculator for CommitQuality {
   fn name(&self) -> &'static str {
      "Commit Quality"
   }

   fn weight(&self) -> f64 {
      0.15
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let commits = forge.get_recent_commits(owner, name, 50)?;

      if commits.is_empty() {
         return MetricResult::new(
            self.name(),
            0.0,
            self.weight(),
            "Share of recent commits with descriptive subjects",
            "No commits found",
         );
      }

      let total = commits.len();
      let good = commits
         .iter()
         .filter(|c| is_good_subject(c.subject()))
         .count();
      let score = 100.0 * good as f64 / total as f64;

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Share of recent commits with descriptive subjects",
         format!("{good} of {total} recent commits have descriptive subjects"),
      )
   }
}

// === Activity ===

/// Tiered freshness score over days since the latest commit.
fn activity_score(days: i64) -> f64 {
   if days <= 7 {
      100.0
   } else if days <= 30 {
      90.0
   } else if days <= 90 {
      70.0
   } else if days <= 180 {
      50.0
   } else if days <= 365 {
      30.0
   } else {
      10.0
   }
}

pub struct Activity;

impl MetricCalculator for Activity {
   fn name(&self) -> &'static str {
      "Activity"
   }

   fn weight(&self) -> f64 {
      0.15
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let commits = forge.get_recent_commits(owner, name, 10)?;

      let Some(latest) = commits.iter().map(|c| c.date).max() else {
         return MetricResult::new(
            self.name(),
            0.0,
            self.weight(),
            "Recency of the latest commit",
            "No commits found",
         );
      };

      let days = (Utc::now() - latest).num_days();
      let score = activity_score(days);

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Recency of the latest commit",
         format!("Latest commit {days} day(s) ago"),
      )
   }
}

// === Issue Management ===

/// Closure-rate base score before the backlog penalty.
fn issue_base_score(rate: f64) -> f64 {
   if rate >= 80.0 {
      100.0
   } else if rate >= 60.0 {
      85.0
   } else if rate >= 40.0 {
      70.0
   } else if rate >= 20.0 {
      50.0
   } else {
      30.0
   }
}

/// Backlog penalty: large open backlogs discount the closure-rate score.
fn backlog_multiplier(open: u64) -> f64 {
   if open > 100 {
      0.8
   } else if open > 50 {
      0.9
   } else {
      1.0
   }
}

/// Estimate the closed count when the forge refuses to page the listing
/// (HTTP 422). Assumes a 70% closure rate over the implied total.
fn estimate_closed(open: u64) -> u64 {
   (open as f64 / 0.3 * 0.7).max(0.0) as u64
}

pub struct IssueManagement;

impl MetricCalculator for IssueManagement {
   fn name(&self) -> &'static str {
      "Issue Management"
   }

   fn weight(&self) -> f64 {
      0.20
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let repo = forge.get_repository(owner, name)?;

      if !repo.has_issues {
         return MetricResult::new(
            self.name(),
            50.0,
            self.weight(),
            "Issue closure rate and backlog size",
            "Issue tracking disabled",
         );
      }

      let open = repo.open_issues;
      let (closed, estimated) = match forge.get_closed_issues_count(owner, name) {
         Ok(count) => (count, false),
         Err(e) if e.is_too_large() => (estimate_closed(open), true),
         Err(e) => return Err(e),
      };

      if open + closed == 0 {
         return MetricResult::new(
            self.name(),
            80.0,
            self.weight(),
            "Issue closure rate and backlog size",
            "No issues recorded yet",
         );
      }

      let rate = 100.0 * closed as f64 / (open + closed) as f64;
      let score = (issue_base_score(rate) * backlog_multiplier(open)).min(100.0);

      let details = format!(
         "{open} open, {closed}{} closed ({rate:.1}% closure rate)",
         if estimated { " (estimated)" } else { "" }
      );

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Issue closure rate and backlog size",
         details,
      )
   }
}

// === Community ===

pub struct Community;

impl Community {
   fn subscores(stars: u64, forks: u64, contributors: u64) -> (f64, f64, f64) {
      let star_score = (stars as f64 / 10.0).min(100.0);
      let fork_score = (forks as f64 / 5.0).min(100.0);
      let contrib_score = (contributors as f64 * 10.0).min(100.0);
      (star_score, fork_score, contrib_score)
   }
}

impl MetricCalculator for Community {
   fn name(&self) -> &'static str {
      "Community"
   }

   fn weight(&self) -> f64 {
      0.15
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let repo = forge.get_repository(owner, name)?;
      let contributors = forge.get_contributor_count(owner, name)?;

      let (star_score, fork_score, contrib_score) =
         Self::subscores(repo.stars, repo.forks, contributors);
      let score = 0.4 * star_score + 0.3 * fork_score + 0.3 * contrib_score;

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Stars, forks, and contributor base",
         format!(
            "{} star(s), {} fork(s), {} contributor(s)",
            repo.stars, repo.forks, contributors
         ),
      )
   }
}

// === Branch Management ===

/// Tiered score over the branch count: few branches read as a tidy repo.
fn branch_score(branches: u64) -> f64 {
   if branches <= 3 {
      100.0
   } else if branches <= 5 {
      95.0
   } else if branches <= 10 {
      85.0
   } else if branches <= 20 {
      70.0
   } else if branches <= 50 {
      50.0
   } else {
      30.0
   }
}

pub struct BranchManagement;

impl MetricCalculator for BranchManagement {
   fn name(&self) -> &'static str {
      "Branch Management"
   }

   fn weight(&self) -> f64 {
      0.15
   }

   fn calculate(&self, forge: &GithubClient, owner: &str, name: &str) -> Result<MetricResult> {
      let branches = forge.get_branch_count(owner, name)?;
      let score = branch_score(branches);

      MetricResult::new(
         self.name(),
         score,
         self.weight(),
         "Number of active branches",
         format!("{branches} branch(es)"),
      )
   }
}
