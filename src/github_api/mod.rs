use crate::deadline::Deadline;
use anyhow::{Context, Result};
use std::{env, error::Error, fmt};

mod projects;
mod query;
mod rate_limit;

pub use projects::{get_projects, reconcile, Project, QueryError, NOT_FOUND};
pub use query::{build_query, AliasedQuery, RepoRef};
pub use rate_limit::{parse_rate_limit_headers, RateLimitStats};

pub const GITHUB_GRAPHQL_ENDPOINT: &'static str =
  "https://api.github.com/graphql";
pub const GITHUB_HOST: &'static str = "github.com";
const USER_AGENT: &'static str = "project_usage/0.1.0";
const LOG_TARGET: &'static str = "github_api";

/// Explicit token wins, then `GITHUB_TOKEN` (a `.env` file is honored).
pub fn get_token(explicit: Option<String>) -> Result<String> {
  dotenv::dotenv().ok();

  explicit
    .filter(|token| !token.is_empty())
    .or_else(|| env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    .ok_or_else(|| {
      anyhow::anyhow!(
        "Github token not configured. Either set environment variable \
         GITHUB_TOKEN or use flag --token"
      )
    })
}

pub fn graphql_endpoint() -> String {
  env::var("GITHUB_GRAPHQL_URL")
    .unwrap_or_else(|_| GITHUB_GRAPHQL_ENDPOINT.to_owned())
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum UsageError {
  Format(String),
  Transport(String),
  QueryFailed { count: usize, first_message: String },
  Parse(String),
  NoResults { package: String },
  DeadlineExceeded,
}

impl fmt::Display for UsageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Format(repo) => write!(
        f,
        "projectID format error. got '{}' expects 'OWNER/REPONAME'",
        repo
      ),
      Self::Transport(msg) => write!(f, "http request failed: {}", msg),
      Self::QueryFailed {
        count,
        first_message,
      } => write!(
        f,
        "query failed. errors: {}. first error: {}",
        count, first_message
      ),
      Self::Parse(msg) => write!(f, "unexpected response: {}", msg),
      Self::NoResults { package } => write!(
        f,
        "no projects found under https://pkg.go.dev/{}?tab=importedby",
        package
      ),
      Self::DeadlineExceeded => write!(f, "deadline exceeded"),
    }
  }
}

impl Error for UsageError {}

/// Turns a reqwest failure into the matching `UsageError`.
pub(crate) fn transport_err(err: reqwest::Error) -> UsageError {
  if err.is_timeout() {
    UsageError::DeadlineExceeded
  } else {
    UsageError::Transport(err.to_string())
  }
}

/// The single network call the reconciler needs: post a query document and
/// hand back the raw response body.
pub trait GraphqlTransport {
  fn post_query(&self, query: &str, deadline: &Deadline) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct GithubClient {
  client: reqwest::blocking::Client,
  endpoint: String,
  token: String,
}

impl GithubClient {
  pub fn new(token: String) -> Result<Self> {
    Self::with_endpoint(token, graphql_endpoint())
  }

  pub fn with_endpoint(token: String, endpoint: String) -> Result<Self> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(USER_AGENT)
      .build()
      .context("failed to build http client")?;

    Ok(Self {
      client,
      endpoint,
      token,
    })
  }

  fn request(
    &self,
    method: reqwest::Method,
    deadline: &Deadline,
  ) -> Result<reqwest::blocking::RequestBuilder> {
    let mut builder = self
      .client
      .request(method, &self.endpoint)
      .bearer_auth(&self.token);
    if let Some(remaining) = deadline.remaining()? {
      builder = builder.timeout(remaining);
    }
    Ok(builder)
  }
}

#[derive(serde::Serialize)]
struct QueryBody<'a> {
  query: &'a str,
}

impl GraphqlTransport for GithubClient {
  fn post_query(&self, query: &str, deadline: &Deadline) -> Result<Vec<u8>> {
    log::debug!(
      target: LOG_TARGET,
      "posting query of {} bytes to {}",
      query.len(),
      self.endpoint
    );

    let res = self
      .request(reqwest::Method::POST, deadline)?
      .json(&QueryBody { query })
      .send()
      .map_err(transport_err)?;

    let status = res.status();
    let body = res.bytes().map_err(transport_err)?;

    check_status(status, &body)?;

    Ok(body.to_vec())
  }
}

/// Any status from 400 up fails the request, carrying the raw body.
fn check_status(
  status: reqwest::StatusCode,
  body: &[u8],
) -> Result<()> {
  if status.as_u16() > 399 {
    return Err(
      UsageError::Transport(format!(
        "status: {}. body: {}",
        status.as_u16(),
        String::from_utf8_lossy(body)
      ))
      .into(),
    );
  }

  Ok(())
}

#[test]
fn explicit_token_wins() -> Result<()> {
  assert_eq!(get_token(Some("abc".to_owned()))?, "abc");

  Ok(())
}

#[test]
fn error_messages() {
  assert_eq!(
    UsageError::Format("bad".to_owned()).to_string(),
    "projectID format error. got 'bad' expects 'OWNER/REPONAME'"
  );
  assert_eq!(
    UsageError::QueryFailed {
      count: 2,
      first_message: "boom".to_owned()
    }
    .to_string(),
    "query failed. errors: 2. first error: boom"
  );
  assert_eq!(
    UsageError::NoResults {
      package: "github.com/a/b".to_owned()
    }
    .to_string(),
    "no projects found under https://pkg.go.dev/github.com/a/b?tab=importedby"
  );
}

#[test]
fn error_status_carries_body() -> Result<()> {
  let err = check_status(
    reqwest::StatusCode::UNAUTHORIZED,
    br#"{"message": "Bad credentials"}"#,
  )
  .unwrap_err();

  crate::check_error(
    err,
    &UsageError::Transport(
      r#"status: 401. body: {"message": "Bad credentials"}"#.to_owned(),
    ),
  )
}

#[test]
fn success_status_passes() -> Result<()> {
  check_status(reqwest::StatusCode::OK, b"{}")?;
  check_status(reqwest::StatusCode::from_u16(399)?, b"")?;

  let err =
    check_status(reqwest::StatusCode::from_u16(400)?, b"").unwrap_err();
  assert!(matches!(
    err.downcast_ref::<UsageError>(),
    Some(UsageError::Transport(_))
  ));

  Ok(())
}
