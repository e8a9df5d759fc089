//! Analysis orchestrator.
//!
//! Runs the six calculators sequentially against the forge, aggregates the
//! weighted overall score, and renders the recommendation line. Any
//! calculator error aborts the run; there are no partial reports.

use indexmap::IndexMap;

use crate::{
   error::Result,
   github::GithubClient,
   metrics::{MetricCalculator, all_calculators},
   types::{MetricResult, Report},
};

pub struct RepoAnalyzer {
   forge:       GithubClient,
   calculators: Vec<Box<dyn MetricCalculator>>,
}

impl RepoAnalyzer {
   pub fn new(forge: GithubClient) -> Self {
      Self { forge, calculators: all_calculators() }
   }

   pub const fn forge(&self) -> &GithubClient {
      &self.forge
   }

   /// Run the full analysis for one repository.
   ///
   /// Calculators run in fixed order and their results land in the report in
   /// that order. Forge calls stay sequential so rate-limit accounting stays
   /// trivial.
   pub fn analyze(&self, owner: &str, name: &str) -> Result<Report> {
      let mut metrics = IndexMap::new();

      for calculator in &self.calculators {
         let result = calculator.calculate(&self.forge, owner, name)?;
         metrics.insert(result.name.clone(), result);
      }

      let overall_score = weighted_overall(&metrics);
      let recommendation = build_recommendation(overall_score, &metrics);

      Ok(Report {
         repository_full_name: format!("{owner}/{name}"),
         overall_score,
         metrics,
         recommendation,
         llm_analysis: None,
      })
   }
}

/// Weighted mean of the metric scores; 0 when no weight was contributed.
fn weighted_overall(metrics: &IndexMap<String, MetricResult>) -> f64 {
   let total_weight: f64 = metrics.values().map(|m| m.weight).sum();
   if total_weight <= 0.0 {
      return 0.0;
   }
   let weighted: f64 = metrics.values().map(MetricResult::weighted_score).sum();
   weighted / total_weight
}

/// Lead sentence keyed by the overall band, then either praise or the list
/// of metrics scoring under 60, in report order.
fn build_recommendation(overall_score: f64, metrics: &IndexMap<String, MetricResult>) -> String {
   let lead = if overall_score >= 90.0 {
      "Excellent repository maintainability!"
   } else if overall_score >= 75.0 {
      "Good repository maintainability."
   } else if overall_score >= 60.0 {
      "Fair repository maintainability."
   } else {
      "Needs improvement across several areas."
   };

   let weak: Vec<&str> = metrics
      .values()
      .filter(|m| m.score < 60.0)
      .map(|m| m.name.as_str())
      .collect();

   if weak.is_empty() {
      format!("{lead} Keep up the good work!")
   } else {
      format!("{lead} Focus on improving: {}.", weak.join(", "))
   }
}

#[cfg(test)]
mod tests {
   use chrono::{Duration, Utc};

   use super::*;
   use crate::{config::ForgeConfig, types::Rating};

   fn metric(name: &str, score: f64, weight: f64) -> MetricResult {
      MetricResult::new(name, score, weight, "", "").unwrap()
   }

   fn metric_map(entries: &[(&str, f64, f64)]) -> IndexMap<String, MetricResult> {
      entries
         .iter()
         .map(|(name, score, weight)| ((*name).to_string(), metric(name, *score, *weight)))
         .collect()
   }

   // ========== Aggregation Tests ==========

   #[test]
   fn test_weighted_overall_matches_invariant() {
      let metrics = metric_map(&[
         ("a", 20.0, 0.2),
         ("b", 0.0, 0.15),
         ("c", 10.0, 0.15),
         ("d", 24.0, 0.2),
         ("e", 3.18, 0.15),
         ("f", 30.0, 0.15),
      ]);

      let overall = weighted_overall(&metrics);
      let expected = (20.0 * 0.2 + 10.0 * 0.15 + 24.0 * 0.2 + 3.18 * 0.15 + 30.0 * 0.15) / 1.0;
      assert!((overall - expected).abs() < 1e-9);
      assert!((overall - 15.277).abs() < 1e-9);
      assert_eq!(Rating::from_score(overall), Rating::Critical);
   }

   #[test]
   fn test_weighted_overall_zero_weight_is_zero() {
      let metrics = metric_map(&[("a", 100.0, 0.0)]);
      assert_eq!(weighted_overall(&metrics), 0.0);
      assert_eq!(weighted_overall(&IndexMap::new()), 0.0);
   }

   // ========== Recommendation Tests ==========

   #[test]
   fn test_recommendation_praise_when_no_weak_metric() {
      let metrics = metric_map(&[("a", 95.0, 0.5), ("b", 90.0, 0.5)]);
      let rec = build_recommendation(92.5, &metrics);
      assert!(rec.contains("Excellent"));
      assert!(rec.contains("Keep up the good work!"));
   }

   #[test]
   fn test_recommendation_lists_weak_metrics_in_order() {
      let metrics = metric_map(&[
         ("Documentation", 20.0, 0.2),
         ("Commit Quality", 80.0, 0.15),
         ("Activity", 10.0, 0.15),
      ]);
      let rec = build_recommendation(35.0, &metrics);
      assert!(rec.starts_with("Needs improvement"));
      assert!(rec.contains("Focus on improving: Documentation, Activity."));
   }

   #[test]
   fn test_recommendation_band_sentences() {
      let empty = IndexMap::new();
      assert!(build_recommendation(95.0, &empty).contains("Excellent"));
      assert!(build_recommendation(80.0, &empty).contains("Good"));
      assert!(build_recommendation(65.0, &empty).contains("Fair"));
      assert!(build_recommendation(30.0, &empty).contains("Needs improvement"));
   }

   // ========== End-to-end: perfect repository ==========

   fn commits_json(count: usize, days_ago: i64) -> String {
      let date = (Utc::now() - Duration::days(days_ago)).to_rfc3339();
      let items: Vec<String> = (0..count)
         .map(|i| {
            format!(
               r#"{{"sha": "sha{i}", "commit": {{"message": "feat: add capability {i}", "author": {{"name": "dev", "date": "{date}"}}}}}}"#
            )
         })
         .collect();
      format!("[{}]", items.join(","))
   }

   #[test]
   fn test_analyze_perfect_repository() {
      let mut server = mockito::Server::new();

      server
         .mock("GET", "/repos/octocat/hello")
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(
            r#"{
               "name": "hello",
               "owner": {"login": "octocat"},
               "stargazers_count": 1000,
               "forks_count": 500,
               "open_issues_count": 10,
               "has_issues": true,
               "updated_at": "2024-05-01T12:00:00Z"
            }"#,
         )
         .expect_at_least(1)
         .create();

      for path in [
         "README.md",
         "CONTRIBUTING.md",
         "LICENSE",
         "CODE_OF_CONDUCT.md",
         "CHANGELOG.md",
      ] {
         server
            .mock("GET", format!("/repos/octocat/hello/contents/{path}").as_str())
            .with_status(200)
            .with_body("{}")
            .create();
      }

      server
         .mock("GET", "/repos/octocat/hello/commits")
         .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "50".into()))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(commits_json(50, 0))
         .create();
      server
         .mock("GET", "/repos/octocat/hello/commits")
         .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "10".into()))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(commits_json(10, 0))
         .create();

      // 90 closed issues via the last-page link; open=10 -> 90% closure
      server
         .mock("GET", "/repos/octocat/hello/issues")
         .match_query(mockito::Matcher::Any)
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_header("link", r#"<https://x?state=closed&per_page=1&page=90>; rel="last""#)
         .with_body(r#"[{"number": 1}]"#)
         .create();

      let contributors: Vec<String> = (0..25).map(|i| format!(r#"{{"login": "u{i}"}}"#)).collect();
      server
         .mock("GET", "/repos/octocat/hello/contributors")
         .match_query(mockito::Matcher::Any)
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(format!("[{}]", contributors.join(",")))
         .create();

      server
         .mock("GET", "/repos/octocat/hello/branches")
         .match_query(mockito::Matcher::Any)
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(r#"[{"name": "main"}, {"name": "dev"}]"#)
         .create();

      let analyzer = RepoAnalyzer::new(GithubClient::new(&ForgeConfig {
         base_url: server.url(),
         ..Default::default()
      }));

      let report = analyzer.analyze("octocat", "hello").unwrap();

      let order: Vec<&String> = report.metrics.keys().collect();
      assert_eq!(order, vec![
         "Documentation",
         "Commit Quality",
         "Activity",
         "Issue Management",
         "Community",
         "Branch Management",
      ]);

      for metric in report.metrics.values() {
         assert_eq!(metric.score, 100.0, "metric {}", metric.name);
      }

      assert!((report.overall_score - 100.0).abs() < 1e-9);
      assert_eq!(report.rating(), Rating::Excellent);
      assert!(report.recommendation.contains("Excellent"));
      assert!(report.recommendation.contains("Keep up the good work!"));
      assert!(report.llm_analysis.is_none());
   }

   #[test]
   fn test_analyze_aborts_on_first_error() {
      let mut server = mockito::Server::new();
      // Documentation runs first and hits a hard failure on the first probe
      server
         .mock("GET", "/repos/octocat/gone/contents/README.md")
         .with_status(500)
         .create();

      let analyzer = RepoAnalyzer::new(GithubClient::new(&ForgeConfig {
         base_url: server.url(),
         ..Default::default()
      }));

      assert!(analyzer.analyze("octocat", "gone").is_err());
   }
}
