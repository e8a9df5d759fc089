//! AI-powered review of README, commit history, and community signals.
//!
//! Three prompts fan out over a bounded worker pool and join against one
//! overall deadline. Every failure mode on this path — transport, HTTP,
//! parse, deadline — degrades to a canned fallback sub-report; nothing here
//! ever propagates an error into the analysis pipeline.

use std::{
   sync::{Arc, mpsc},
   time::{Duration, Instant},
};

use serde::de::DeserializeOwned;

use crate::{
   api::{Completion, LlmClient},
   cache::PromptCache,
   config::LlmConfig,
   error::Result,
   github::GithubClient,
   normalization::{repair_all, repair_mojibake},
   style,
   types::{
      AiRecommendation, Commit, CommitInsight, CommunityInsight, LlmAnalysis, ReadmeInsight,
      Repository,
   },
};

/// Subscores below this threshold earn a recommendation.
const RECOMMEND_BELOW: u8 = 7;

/// Longest list the review keeps per sub-report.
const MAX_LIST_ITEMS: usize = 5;

/// Shared by the worker tasks: the client plus its prompt cache. The cache
/// is owned here, never process-global; its lifetime is the analyzer's.
struct ReviewContext {
   client: LlmClient,
   cache:  PromptCache,
}

impl ReviewContext {
   /// Cache-through prompt execution: consult the cache, call the model on a
   /// miss, store the success.
   fn run_prompt(&self, repository: &str, prompt: &str) -> Result<Completion> {
      if let Some(hit) = self.cache.get(repository, prompt) {
         return Ok(hit);
      }

      let completion = self.client.analyze(prompt)?;
      self.cache.put(repository, prompt, completion.clone());
      Ok(completion)
   }
}

pub struct LlmAnalyzer {
   ctx:      Arc<ReviewContext>,
   pool:     rayon::ThreadPool,
   deadline: Duration,
}

impl LlmAnalyzer {
   pub fn new(config: LlmConfig) -> Self {
      let ttl =
         (config.cache_ttl_secs > 0).then(|| Duration::from_secs(config.cache_ttl_secs));
      let cache = PromptCache::new(config.cache_capacity, ttl);
      let workers = config.workers.max(3);
      let deadline = Duration::from_secs(config.deadline_secs);

      let pool = rayon::ThreadPoolBuilder::new()
         .num_threads(workers)
         .build()
         .expect("Failed to build worker pool");

      Self { ctx: Arc::new(ReviewContext { client: LlmClient::new(config), cache }), pool, deadline }
   }

   pub fn cache_stats(&self) -> crate::cache::CacheStats {
      self.ctx.cache.stats()
   }

   /// Review one repository. Infallible by contract: forge hiccups shrink
   /// the prompt context, LLM failures and deadline misses land on
   /// fallbacks.
   pub fn analyze(&self, forge: &GithubClient, owner: &str, name: &str) -> LlmAnalysis {
      let full_name = format!("{owner}/{name}");
      let repository = forge.get_repository(owner, name).ok();
      let commits = forge.get_recent_commits(owner, name, 20).unwrap_or_default();

      let prompts = [
         readme_prompt(&full_name, repository.as_ref()),
         commit_prompt(&full_name, &commits),
         community_prompt(&full_name, repository.as_ref()),
      ];

      let outcomes = self.dispatch(&full_name, prompts);
      let [readme_outcome, commit_outcome, community_outcome] = outcomes;

      let mut tokens_used = 0;
      let readme = resolve(readme_outcome, "README", fallback_readme(), &mut tokens_used);
      let commits = resolve(commit_outcome, "commit", fallback_commits(), &mut tokens_used);
      let community =
         resolve(community_outcome, "community", fallback_community(), &mut tokens_used);

      let readme = sanitize_readme(readme);
      let commits = sanitize_commits(commits);
      let community = sanitize_community(community);

      let recommendations = derive_recommendations(&readme, &commits, &community);
      let confidence = confidence_from(&readme, &commits, &community);

      LlmAnalysis { readme, commits, community, recommendations, confidence, tokens_used }
   }

   /// Fan the three prompts out on the pool and join with one overall
   /// deadline. Tasks missing the deadline are abandoned; their slot stays
   /// `None` and the sub-report falls back.
   fn dispatch(&self, repository: &str, prompts: [String; 3]) -> [Option<Result<Completion>>; 3] {
      let (tx, rx) = mpsc::channel();

      for (idx, prompt) in prompts.into_iter().enumerate() {
         let tx = tx.clone();
         let ctx = Arc::clone(&self.ctx);
         let repository = repository.to_string();

         self.pool.spawn(move || {
            let outcome = ctx.run_prompt(&repository, &prompt);
            tx.send((idx, outcome)).ok();
         });
      }
      drop(tx);

      let cutoff = Instant::now() + self.deadline;
      let mut outcomes: [Option<Result<Completion>>; 3] = [None, None, None];
      let mut received = 0;

      while received < outcomes.len() {
         let remaining = cutoff.saturating_duration_since(Instant::now());
         if remaining.is_zero() {
            style::warn("AI review deadline reached; remaining prompts fall back");
            break;
         }
         match rx.recv_timeout(remaining) {
            Ok((idx, outcome)) => {
               outcomes[idx] = Some(outcome);
               received += 1;
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {
               style::warn("AI review deadline reached; remaining prompts fall back");
               break;
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
         }
      }

      outcomes
   }
}

/// Turn one task outcome into a parsed sub-report, falling back on any
/// failure. Billed tokens count even when the payload fails to parse.
fn resolve<T: DeserializeOwned>(
   outcome: Option<Result<Completion>>,
   label: &str,
   fallback: T,
   tokens_used: &mut u64,
) -> T {
   match outcome {
      Some(Ok(completion)) => {
         *tokens_used += completion.tokens_used;
         match parse_json_payload::<T>(&completion.content) {
            Ok(parsed) => parsed,
            Err(e) => {
               style::warn(&format!("Unparsable {label} review, using fallback: {e}"));
               fallback
            },
         }
      },
      Some(Err(e)) => {
         style::warn(&format!("{label} review failed, using fallback: {e}"));
         fallback
      },
      None => fallback,
   }
}

/// Parse a JSON object out of a model reply, tolerating markdown fences.
fn parse_json_payload<T: DeserializeOwned>(content: &str) -> Result<T> {
   Ok(serde_json::from_str(strip_code_fences(content))?)
}

fn strip_code_fences(content: &str) -> &str {
   let trimmed = content.trim();
   let Some(rest) = trimmed.strip_prefix("```") else {
      return trimmed;
   };
   let rest = rest.strip_prefix("json").unwrap_or(rest);
   match rest.rfind("```") {
      Some(end) => rest[..end].trim(),
      None => rest.trim(),
   }
}

// === Prompts ===

fn readme_prompt(full_name: &str, repository: Option<&Repository>) -> String {
   let description = repository
      .and_then(|r| r.description.as_deref())
      .unwrap_or("(no description provided)");

   format!(
      "Review the README of the repository {full_name} (project description: \
       {description}) from the perspective of a newcomer. Rate clarity, completeness and \
       newcomer friendliness. Respond with only a JSON object of the shape \
       {{\"clarity\": 0-10, \"completeness\": 0-10, \"newcomer_friendliness\": 0-10, \
       \"strengths\": [up to 3 short strings], \"gaps\": [up to 3 short strings]}}."
   )
}

fn commit_prompt(full_name: &str, commits: &[Commit]) -> String {
   let subjects = if commits.is_empty() {
      "(no commits available)".to_string()
   } else {
      commits
         .iter()
         .map(|c| format!("- {}", c.subject()))
         .collect::<Vec<_>>()
         .join("\n")
   };

   format!(
      "Review the recent commit subjects of the repository {full_name} for clarity, \
       consistency and informativeness:\n{subjects}\nRespond with only a JSON object of the \
       shape {{\"clarity\": 0-10, \"consistency\": 0-10, \"informativeness\": 0-10, \
       \"observations\": [up to 3 short strings]}}."
   )
}

fn community_prompt(full_name: &str, repository: Option<&Repository>) -> String {
   let context = repository.map_or_else(
      || "(repository metadata unavailable)".to_string(),
      |r| {
         format!(
            "{} star(s), {} fork(s), {} open issue(s)",
            r.stars, r.forks, r.open_issues
         )
      },
   );

   format!(
      "Assess the community health of the repository {full_name} ({context}): how \
       responsive, helpful and welcoming does the project come across? Respond with only a \
       JSON object of the shape {{\"responsiveness\": 0-10, \"helpfulness\": 0-10, \
       \"tone\": 0-10, \"suggestions\": [up to 3 short strings]}}."
   )
}

// === Fallback sub-reports ===

fn fallback_readme() -> ReadmeInsight {
   ReadmeInsight {
      clarity:               5,
      completeness:          5,
      newcomer_friendliness: 5,
      strengths:             vec![repair_mojibake("Review unavailable; neutral defaults applied")],
      gaps:                  vec![
         repair_mojibake("Add a quick-start section to the README"),
         repair_mojibake("Document the contribution workflow"),
      ],
   }
}

fn fallback_commits() -> CommitInsight {
   CommitInsight {
      clarity:         5,
      consistency:     5,
      informativeness: 5,
      observations:    vec![
         repair_mojibake("Review unavailable; neutral defaults applied"),
         repair_mojibake("Adopt conventional commit subjects for consistency"),
      ],
   }
}

fn fallback_community() -> CommunityInsight {
   CommunityInsight {
      responsiveness: 5,
      helpfulness:    5,
      tone:           5,
      suggestions:    vec![
         repair_mojibake("Review unavailable; neutral defaults applied"),
         repair_mojibake("Respond to new issues within a few days"),
      ],
   }
}

// === Sanitization ===

fn clamp_subscore(value: u8) -> u8 {
   value.min(10)
}

fn sanitize_list(items: &mut Vec<String>) {
   repair_all(items);
   items.retain(|item| !item.trim().is_empty());
   items.truncate(MAX_LIST_ITEMS);
}

fn sanitize_readme(mut insight: ReadmeInsight) -> ReadmeInsight {
   insight.clarity = clamp_subscore(insight.clarity);
   insight.completeness = clamp_subscore(insight.completeness);
   insight.newcomer_friendliness = clamp_subscore(insight.newcomer_friendliness);
   sanitize_list(&mut insight.strengths);
   sanitize_list(&mut insight.gaps);
   insight
}

fn sanitize_commits(mut insight: CommitInsight) -> CommitInsight {
   insight.clarity = clamp_subscore(insight.clarity);
   insight.consistency = clamp_subscore(insight.consistency);
   insight.informativeness = clamp_subscore(insight.informativeness);
   sanitize_list(&mut insight.observations);
   insight
}

fn sanitize_community(mut insight: CommunityInsight) -> CommunityInsight {
   insight.responsiveness = clamp_subscore(insight.responsiveness);
   insight.helpfulness = clamp_subscore(insight.helpfulness);
   insight.tone = clamp_subscore(insight.tone);
   sanitize_list(&mut insight.suggestions);
   insight
}

// === Derived output ===

fn subscore_table<'a>(
   readme: &'a ReadmeInsight,
   commits: &'a CommitInsight,
   community: &'a CommunityInsight,
) -> [(&'a str, u8, &'a str); 9] {
   [
      ("README clarity", readme.clarity, "Rework the README introduction so the project's purpose is obvious"),
      ("README completeness", readme.completeness, "Cover installation, usage and configuration in the README"),
      ("README newcomer friendliness", readme.newcomer_friendliness, "Add a quick-start path for first-time users"),
      ("Commit clarity", commits.clarity, "Write commit subjects that describe the change, not the activity"),
      ("Commit consistency", commits.consistency, "Adopt one commit subject convention and stick to it"),
      ("Commit informativeness", commits.informativeness, "Mention the affected area in each commit subject"),
      ("Community responsiveness", community.responsiveness, "Triage and answer new issues within a few days"),
      ("Community helpfulness", community.helpfulness, "Leave actionable replies on issues and reviews"),
      ("Community tone", community.tone, "Keep issue and review threads welcoming to newcomers"),
   ]
}

/// One recommendation per weak sub-area, strongest impact first. The list is
/// never empty: a healthy review still yields a keep-it-up entry.
fn derive_recommendations(
   readme: &ReadmeInsight,
   commits: &CommitInsight,
   community: &CommunityInsight,
) -> Vec<AiRecommendation> {
   let mut recommendations: Vec<AiRecommendation> = subscore_table(readme, commits, community)
      .into_iter()
      .filter(|(_, score, _)| *score < RECOMMEND_BELOW)
      .map(|(area, score, suggestion)| AiRecommendation {
         area:       area.to_string(),
         suggestion: suggestion.to_string(),
         impact:     10 - score,
      })
      .collect();

   recommendations.sort_by(|a, b| b.impact.cmp(&a.impact));

   if recommendations.is_empty() {
      recommendations.push(AiRecommendation {
         area:       "Overall".to_string(),
         suggestion: "No weak areas detected; maintain current practices".to_string(),
         impact:     1,
      });
   }

   recommendations
}

/// Mean subscore coverage mapped onto [25, 95].
fn confidence_from(
   readme: &ReadmeInsight,
   commits: &CommitInsight,
   community: &CommunityInsight,
) -> f64 {
   let table = subscore_table(readme, commits, community);
   let mean =
      table.iter().map(|(_, score, _)| f64::from(*score)).sum::<f64>() / table.len() as f64;
   (mean * 10.0).clamp(25.0, 95.0)
}
