//! Report serialization.
//!
//! Two neutral renderings: a stable JSON shape for machines and a
//! deterministic plain-text form. Terminal decoration stays at the CLI
//! boundary; nothing here emits color or box drawing.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
   error::Result,
   types::{LlmAnalysis, Report},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportJson<'a> {
   repository:     &'a str,
   overall_score:  f64,
   rating:         &'static str,
   /// Insertion order mirrors the report's metric order
   metrics:        IndexMap<&'a str, MetricJson<'a>>,
   recommendation: &'a str,
   #[serde(skip_serializing_if = "Option::is_none")]
   llm_analysis:   Option<&'a LlmAnalysis>,
}

#[derive(Serialize)]
struct MetricJson<'a> {
   score:       f64,
   weight:      f64,
   description: &'a str,
   details:     &'a str,
}

/// Round to two decimals for presentation; the report keeps full precision.
fn round2(value: f64) -> f64 {
   (value * 100.0).round() / 100.0
}

/// Render the stable JSON form.
pub fn render_json(report: &Report) -> Result<String> {
   let metrics: IndexMap<&str, MetricJson<'_>> = report
      .metrics
      .values()
      .map(|m| {
         (m.name.as_str(), MetricJson {
            score:       round2(m.score),
            weight:      m.weight,
            description: m.description.as_str(),
            details:     m.details.as_str(),
         })
      })
      .collect();

   let shape = ReportJson {
      repository: report.repository_full_name.as_str(),
      overall_score: round2(report.overall_score),
      rating: report.rating().as_str(),
      metrics,
      recommendation: report.recommendation.as_str(),
      llm_analysis: report.llm_analysis.as_ref(),
   };

   Ok(serde_json::to_string_pretty(&shape)?)
}

/// Render the deterministic plain-text form.
pub fn render_text(report: &Report) -> String {
   use std::fmt::Write;

   let mut out = String::new();
   let _ = writeln!(out, "Repository: {}", report.repository_full_name);
   let _ = writeln!(
      out,
      "Overall score: {:.2} ({})",
      round2(report.overall_score),
      report.rating()
   );
   out.push('\n');

   let _ = writeln!(out, "Metrics:");
   for metric in report.metrics.values() {
      let _ = writeln!(
         out,
         "  {:<18} {:>6.2}  (weight {:.2})  {}",
         metric.name,
         round2(metric.score),
         metric.weight,
         metric.details
      );
   }
   out.push('\n');

   let _ = writeln!(out, "Recommendation: {}", report.recommendation);

   if let Some(analysis) = &report.llm_analysis {
      out.push('\n');
      render_llm_text(&mut out, analysis);
   }

   out
}

fn render_llm_text(out: &mut String, analysis: &LlmAnalysis) {
   use std::fmt::Write;

   let _ = writeln!(
      out,
      "AI review (confidence {:.0}%, {} token(s)):",
      analysis.confidence, analysis.tokens_used
   );
   let _ = writeln!(
      out,
      "  README: clarity {}/10, completeness {}/10, newcomer friendliness {}/10",
      analysis.readme.clarity,
      analysis.readme.completeness,
      analysis.readme.newcomer_friendliness
   );
   let _ = writeln!(
      out,
      "  Commits: clarity {}/10, consistency {}/10, informativeness {}/10",
      analysis.commits.clarity, analysis.commits.consistency, analysis.commits.informativeness
   );
   let _ = writeln!(
      out,
      "  Community: responsiveness {}/10, helpfulness {}/10, tone {}/10",
      analysis.community.responsiveness,
      analysis.community.helpfulness,
      analysis.community.tone
   );

   let _ = writeln!(out, "  Suggestions:");
   for recommendation in &analysis.recommendations {
      let _ = writeln!(
         out,
         "    [{}] {}: {}",
         recommendation.impact, recommendation.area, recommendation.suggestion
      );
   }
}
