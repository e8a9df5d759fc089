//! Forge REST client.
//!
//! Thin blocking client over the GitHub-style REST surface. Holds immutable
//! config and no per-call state, so one instance is safe to share. Callers
//! impose any concurrency; every call here blocks the calling thread.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{
   StatusCode,
   header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT},
};
use serde::Deserialize;

use crate::{
   config::ForgeConfig,
   error::{AnalyzeError, Result},
   types::{Commit, Repository},
};

/// Single-page cap enforced by the forge; listings never request more.
const PAGE_CAP: u64 = 100;

pub struct GithubClient {
   http:     reqwest::blocking::Client,
   base_url: String,
   token:    Option<String>,
}

// === Wire DTOs ===

#[derive(Debug, Deserialize)]
struct RepoDto {
   name:              String,
   owner:             OwnerDto,
   description:       Option<String>,
   #[serde(default)]
   stargazers_count:  u64,
   #[serde(default)]
   forks_count:       u64,
   #[serde(default)]
   open_issues_count: u64,
   updated_at:        DateTime<Utc>,
   #[serde(default)]
   has_wiki:          bool,
   #[serde(default)]
   has_issues:        bool,
   #[serde(default = "default_branch_name")]
   default_branch:    String,
   #[serde(default)]
   size:              u64,
}

fn default_branch_name() -> String {
   "main".to_string()
}

#[derive(Debug, Deserialize)]
struct OwnerDto {
   login: String,
}

#[derive(Debug, Deserialize)]
struct CommitDto {
   sha:    String,
   commit: CommitDetailDto,
}

#[derive(Debug, Deserialize)]
struct CommitDetailDto {
   message: String,
   author:  Option<CommitAuthorDto>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthorDto {
   name: Option<String>,
   date: DateTime<Utc>,
}

impl GithubClient {
   pub fn new(config: &ForgeConfig) -> Self {
      let mut headers = HeaderMap::new();
      headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
      if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
         headers.insert(USER_AGENT, ua);
      }

      let http = reqwest::blocking::Client::builder()
         .timeout(Duration::from_secs(config.request_timeout_secs))
         .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
         .default_headers(headers)
         .build()
         .expect("Failed to build HTTP client");

      Self {
         http,
         base_url: config.base_url.trim_end_matches('/').to_string(),
         token: config.token.clone(),
      }
   }

   /// Fetch repository metadata.
   pub fn get_repository(&self, owner: &str, name: &str) -> Result<Repository> {
      let resource = format!("{owner}/{name}");
      let resp = self.send(&format!("repos/{owner}/{name}"))?;
      let resp = check_status(resp, &resource)?;
      let dto: RepoDto = resp.json()?;

      Ok(Repository {
         owner:          dto.owner.login,
         name:           dto.name,
         description:    dto.description,
         stars:          dto.stargazers_count,
         forks:          dto.forks_count,
         open_issues:    dto.open_issues_count,
         last_updated:   dto.updated_at,
         has_wiki:       dto.has_wiki,
         has_issues:     dto.has_issues,
         default_branch: dto.default_branch,
         size:           dto.size,
      })
   }

   /// Fetch up to `count` most recent commits in a single page (capped at
   /// 100 by the forge; this client never paginates commit history).
   pub fn get_recent_commits(&self, owner: &str, name: &str, count: u64) -> Result<Vec<Commit>> {
      let per_page = count.min(PAGE_CAP);
      let resource = format!("{owner}/{name}");
      let resp = self.send(&format!("repos/{owner}/{name}/commits?per_page={per_page}"))?;
      let resp = check_status(resp, &resource)?;
      let dtos: Vec<CommitDto> = resp.json()?;

      dtos
         .into_iter()
         .filter_map(|dto| {
            let author = dto.commit.author?;
            let author_name = author.name.unwrap_or_else(|| "unknown".to_string());
            Some(Commit::new(dto.sha, dto.commit.message, author_name, author.date))
         })
         .collect()
   }

   /// Probe a path via the contents endpoint: 2xx means present, 404 means
   /// absent, anything else is a protocol failure.
   pub fn has_file(&self, owner: &str, name: &str, path: &str) -> Result<bool> {
      let resource = format!("{owner}/{name}/{path}");
      let resp = self.send(&format!("repos/{owner}/{name}/contents/{path}"))?;
      let status = resp.status();

      if status.is_success() {
         return Ok(true);
      }
      if status == StatusCode::NOT_FOUND {
         return Ok(false);
      }
      Err(failure(resp, &resource))
   }

   /// Count branches in the first page of results. A lower bound for
   /// repositories with more than 100 branches.
   pub fn get_branch_count(&self, owner: &str, name: &str) -> Result<u64> {
      self.count_first_page(owner, name, "branches")
   }

   /// Count contributors in the first page of results, same lower-bound
   /// caveat as branches.
   pub fn get_contributor_count(&self, owner: &str, name: &str) -> Result<u64> {
      self.count_first_page(owner, name, "contributors")
   }

   /// Count closed issues by reading the `rel="last"` pagination link of a
   /// one-item page. Falls back to the body length when the forge omits the
   /// link (everything fit on one page).
   ///
   /// A 422 here means the dataset is too large to page; it surfaces as
   /// `ListingTooLarge` so the issue metric can estimate instead of failing.
   pub fn get_closed_issues_count(&self, owner: &str, name: &str) -> Result<u64> {
      let resource = format!("{owner}/{name}/issues");
      let resp = self.send(&format!("repos/{owner}/{name}/issues?state=closed&per_page=1"))?;
      let resp = check_status(resp, &resource)?;

      let link_header = resp
         .headers()
         .get(LINK)
         .and_then(|v| v.to_str().ok())
         .map(ToString::to_string);

      let body: Vec<serde_json::Value> = resp.json()?;

      if let Some(count) = link_header.as_deref().and_then(last_page_number) {
         Ok(count)
      } else {
         Ok(body.len() as u64)
      }
   }

   fn count_first_page(&self, owner: &str, name: &str, listing: &str) -> Result<u64> {
      let resource = format!("{owner}/{name}/{listing}");
      let resp = self.send(&format!("repos/{owner}/{name}/{listing}?per_page={PAGE_CAP}"))?;
      let resp = check_status(resp, &resource)?;
      let body: Vec<serde_json::Value> = resp.json()?;
      Ok(body.len() as u64)
   }

   fn send(&self, path: &str) -> Result<reqwest::blocking::Response> {
      let url = format!("{}/{path}", self.base_url);
      let mut request = self.http.get(&url);
      if let Some(token) = &self.token {
         request = request.header(AUTHORIZATION, format!("Bearer {token}"));
      }
      Ok(request.send()?)
   }
}

/// Map a non-2xx response into the matching error kind.
fn check_status(
   resp: reqwest::blocking::Response,
   resource: &str,
) -> Result<reqwest::blocking::Response> {
   if resp.status().is_success() {
      Ok(resp)
   } else {
      Err(failure(resp, resource))
   }
}

fn failure(resp: reqwest::blocking::Response, resource: &str) -> AnalyzeError {
   let status = resp.status();

   match status {
      StatusCode::NOT_FOUND => AnalyzeError::RepoNotFound(resource.to_string()),
      StatusCode::UNPROCESSABLE_ENTITY => {
         AnalyzeError::ListingTooLarge { resource: resource.to_string() }
      },
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
         let exhausted = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");

         if status == StatusCode::FORBIDDEN && exhausted {
            AnalyzeError::RateLimited { status: status.as_u16() }
         } else {
            AnalyzeError::Unauthorized { status: status.as_u16() }
         }
      },
      _ => {
         let body = resp.text().unwrap_or_default();
         AnalyzeError::Protocol { status: status.as_u16(), body: snippet(&body, 200) }
      },
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

/// Extract the `page` parameter of the `rel="last"` link from an RFC 5988
/// link header. Matches the parameter name exactly so `per_page=1` never
/// shadows it, in either parameter ordering.
fn last_page_number(link_header: &str) -> Option<u64> {
   for segment in link_header.split(',') {
      if !segment.contains("rel=\"last\"") {
         continue;
      }
      let url = segment.trim().strip_prefix('<')?;
      let url = &url[..url.find('>')?];
      let query = url.split_once('?').map(|(_, q)| q)?;

      for pair in query.split('&') {
         if let Some(("page", value)) = pair.split_once('=') {
            return value.parse().ok();
         }
      }
   }
   None
}

#[cfg(test)]
mod tests {
   use super::*;

   fn test_client(server: &mockito::Server) -> GithubClient {
      GithubClient::new(&ForgeConfig {
         base_url: server.url(),
         token: Some("test-token".to_string()),
         ..Default::default()
      })
   }

   fn repo_json() -> &'static str {
      r#"{
         "name": "hello",
         "owner": {"login": "octocat"},
         "description": "demo project",
         "stargazers_count": 42,
         "forks_count": 7,
         "open_issues_count": 3,
         "updated_at": "2024-05-01T12:00:00Z",
         "has_wiki": true,
         "has_issues": true,
         "default_branch": "main",
         "size": 128
      }"#
   }

   // ========== last_page_number Tests ==========

   #[test]
   fn test_last_page_number_basic() {
      let link = r#"<https://x?state=closed&per_page=1&page=2>; rel="next", <https://x?state=closed&per_page=1&page=123>; rel="last""#;
      assert_eq!(last_page_number(link), Some(123));
   }

   #[test]
   fn test_last_page_number_page_first_ordering() {
      let link = r#"<https://x?page=55&per_page=1>; rel="last""#;
      assert_eq!(last_page_number(link), Some(55));
   }

   #[test]
   fn test_last_page_number_ignores_per_page() {
      // per_page=1 contains the substring "page=" and must not be picked up
      let link = r#"<https://x?per_page=1&state=closed&page=9>; rel="last""#;
      assert_eq!(last_page_number(link), Some(9));
   }

   #[test]
   fn test_last_page_number_no_last_rel() {
      let link = r#"<https://x?page=2>; rel="next""#;
      assert_eq!(last_page_number(link), None);
   }

   #[test]
   fn test_last_page_number_empty_or_garbage() {
      assert_eq!(last_page_number(""), None);
      assert_eq!(last_page_number("not a link header"), None);
      assert_eq!(last_page_number(r#"<no-query>; rel="last""#), None);
   }

   // ========== get_repository Tests ==========

   #[test]
   fn test_get_repository_maps_fields() {
      let mut server = mockito::Server::new();
      let mock = server
         .mock("GET", "/repos/octocat/hello")
         .match_header("authorization", "Bearer test-token")
         .match_header("accept", "application/vnd.github+json")
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(repo_json())
         .create();

      let repo = test_client(&server).get_repository("octocat", "hello").unwrap();
      mock.assert();

      assert_eq!(repo.full_name(), "octocat/hello");
      assert_eq!(repo.stars, 42);
      assert_eq!(repo.forks, 7);
      assert_eq!(repo.open_issues, 3);
      assert!(repo.has_wiki);
      assert_eq!(repo.default_branch, "main");
      assert_eq!(repo.size, 128);
   }

   #[test]
   fn test_get_repository_not_found() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/octocat/missing")
         .with_status(404)
         .create();

      let err = test_client(&server)
         .get_repository("octocat", "missing")
         .unwrap_err();
      assert!(matches!(err, AnalyzeError::RepoNotFound(_)));
   }

   #[test]
   fn test_get_repository_rate_limited() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/octocat/hello")
         .with_status(403)
         .with_header("x-ratelimit-remaining", "0")
         .create();

      let err = test_client(&server)
         .get_repository("octocat", "hello")
         .unwrap_err();
      assert!(matches!(err, AnalyzeError::RateLimited { status: 403 }));
   }

   #[test]
   fn test_get_repository_unauthorized() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/octocat/hello")
         .with_status(401)
         .create();

      let err = test_client(&server)
         .get_repository("octocat", "hello")
         .unwrap_err();
      assert!(matches!(err, AnalyzeError::Unauthorized { status: 401 }));
   }

   #[test]
   fn test_get_repository_server_error_is_protocol() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/octocat/hello")
         .with_status(502)
         .with_body("bad gateway")
         .create();

      let err = test_client(&server)
         .get_repository("octocat", "hello")
         .unwrap_err();
      assert!(matches!(err, AnalyzeError::Protocol { status: 502, .. }));
   }

   // ========== get_recent_commits Tests ==========

   #[test]
   fn test_get_recent_commits_caps_page_size() {
      let mut server = mockito::Server::new();
      let mock = server
         .mock("GET", "/repos/o/r/commits")
         .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "100".into()))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body("[]")
         .create();

      let commits = test_client(&server).get_recent_commits("o", "r", 500).unwrap();
      mock.assert();
      assert!(commits.is_empty());
   }

   #[test]
   fn test_get_recent_commits_parses_list() {
      let body = r#"[
         {"sha": "aaa111", "commit": {"message": "feat: one\n\nbody", "author": {"name": "Alice", "date": "2024-04-01T00:00:00Z"}}},
         {"sha": "bbb222", "commit": {"message": "fix: two", "author": {"name": null, "date": "2024-03-01T00:00:00Z"}}}
      ]"#;

      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/commits")
         .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "10".into()))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(body)
         .create();

      let commits = test_client(&server).get_recent_commits("o", "r", 10).unwrap();
      assert_eq!(commits.len(), 2);
      assert_eq!(commits[0].sha, "aaa111");
      assert_eq!(commits[0].subject(), "feat: one");
      assert_eq!(commits[0].author, "Alice");
      assert_eq!(commits[1].author, "unknown");
   }

   // ========== has_file Tests ==========

   #[test]
   fn test_has_file_probe() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/contents/README.md")
         .with_status(200)
         .with_body("{}")
         .create();
      server
         .mock("GET", "/repos/o/r/contents/CHANGELOG.md")
         .with_status(404)
         .create();
      server
         .mock("GET", "/repos/o/r/contents/LICENSE")
         .with_status(500)
         .create();

      let client = test_client(&server);
      assert!(client.has_file("o", "r", "README.md").unwrap());
      assert!(!client.has_file("o", "r", "CHANGELOG.md").unwrap());
      assert!(client.has_file("o", "r", "LICENSE").is_err());
   }

   // ========== count Tests ==========

   #[test]
   fn test_get_branch_count_from_body() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/branches")
         .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "100".into()))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_body(r#"[{"name": "main"}, {"name": "dev"}, {"name": "wip"}]"#)
         .create();

      assert_eq!(test_client(&server).get_branch_count("o", "r").unwrap(), 3);
   }

   #[test]
   fn test_get_closed_issues_count_from_link_header() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/issues")
         .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("state".into(), "closed".into()),
            mockito::Matcher::UrlEncoded("per_page".into(), "1".into()),
         ]))
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_header(
            "link",
            r#"<https://x?state=closed&per_page=1&page=2>; rel="next", <https://x?state=closed&per_page=1&page=123>; rel="last""#,
         )
         .with_body(r#"[{"number": 1}]"#)
         .create();

      assert_eq!(test_client(&server).get_closed_issues_count("o", "r").unwrap(), 123);
   }

   #[test]
   fn test_get_closed_issues_count_without_last_link() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/issues")
         .match_query(mockito::Matcher::Any)
         .with_status(200)
         .with_header("content-type", "application/json")
         .with_header("link", r#"<https://x?page=2>; rel="next""#)
         .with_body(r#"[{"number": 1}]"#)
         .create();

      assert_eq!(test_client(&server).get_closed_issues_count("o", "r").unwrap(), 1);
   }

   #[test]
   fn test_get_closed_issues_count_422_is_too_large() {
      let mut server = mockito::Server::new();
      server
         .mock("GET", "/repos/o/r/issues")
         .match_query(mockito::Matcher::Any)
         .with_status(422)
         .create();

      let err = test_client(&server)
         .get_closed_issues_count("o", "r")
         .unwrap_err();
      assert!(err.is_too_large());
   }
}
