use super::{
  build_query, AliasedQuery, GraphqlTransport, UsageError, LOG_TARGET,
};
use crate::deadline::Deadline;
use anyhow::Result;
use fnv::FnvHashSet;
use serde::Deserialize;
use std::collections::HashMap;

/// GraphQL error type for an alias which didn't resolve to a repository.
pub const NOT_FOUND: &'static str = "NOT_FOUND";

#[derive(Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
  /// Canonical `owner/name`; may differ from the queried repo after a
  /// rename or transfer.
  pub name_with_owner: String,
  pub url: String,
  pub fork_count: u64,
  pub is_fork: bool,
  pub is_archived: bool,
  pub is_in_organization: bool,
  #[serde(alias = "StargazerCount")]
  pub stargazer_count: u64,
}

#[derive(Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(default)]
pub struct QueryError {
  pub message: String,
  #[serde(rename = "type")]
  pub kind: String,
}

impl QueryError {
  pub fn is_not_found(&self) -> bool {
    self.kind == NOT_FOUND
  }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Response {
  data: Option<HashMap<String, Option<Project>>>,
  errors: Option<Vec<QueryError>>,
}

fn check_errors(errors: &[QueryError]) -> Result<()> {
  let (not_found, real): (Vec<_>, Vec<_>) =
    errors.iter().partition(|e| e.is_not_found());

  if !not_found.is_empty() {
    log::debug!(
      target: LOG_TARGET,
      "ignoring {} not found errors",
      not_found.len()
    );
  }

  match real.first() {
    Some(first) => Err(
      UsageError::QueryFailed {
        count: real.len(),
        first_message: first.message.clone(),
      }
      .into(),
    ),
    None => Ok(()),
  }
}

/// Turns a raw response body into unique projects. Aliases which are null,
/// absent, or carry an empty record are dropped the same way an explicit
/// `NOT_FOUND` error is. Any other error fails the whole batch.
pub fn reconcile(query: &AliasedQuery, body: &[u8]) -> Result<Vec<Project>> {
  let response: Response = serde_json::from_slice(body)
    .map_err(|e| UsageError::Parse(e.to_string()))?;

  check_errors(&response.errors.unwrap_or_default())?;

  let mut data = response.data.unwrap_or_default();
  let mut seen = FnvHashSet::default();
  let mut projects = Vec::new();
  let mut missing = 0;
  let mut redirected = 0;

  for (alias, repo) in &query.aliases {
    let project = match data.remove(alias).flatten() {
      Some(project) if !project.name_with_owner.is_empty() => project,
      _ => {
        missing += 1;
        continue;
      }
    };

    // different owner/name pairs can point to the same project due to
    // redirects, e.g. peterbourgon/gokit -> go-kit/kit
    if !seen.insert(project.name_with_owner.clone()) {
      log::debug!(
        target: LOG_TARGET,
        "{} resolved to already seen {}",
        repo,
        project.name_with_owner
      );
      redirected += 1;
      continue;
    }
    projects.push(project);
  }

  if !data.is_empty() {
    log::debug!(
      target: LOG_TARGET,
      "ignoring {} unknown aliases in response",
      data.len()
    );
  }

  log::debug!(
    target: LOG_TARGET,
    "reconciled {} projects ({} missing, {} duplicates)",
    projects.len(),
    missing,
    redirected
  );

  Ok(projects)
}

/// Fetches metadata for every `owner/name` in one aggregate request.
pub fn get_projects<S: AsRef<str>>(
  transport: &impl GraphqlTransport,
  repo_refs: &[S],
  deadline: &Deadline,
) -> Result<Vec<Project>> {
  let query = build_query(repo_refs)?;
  let body = transport.post_query(&query.document, deadline)?;

  reconcile(&query, &body)
}

#[cfg(test)]
fn query_for(repos: &[&str]) -> AliasedQuery {
  build_query(repos).unwrap()
}

#[test]
fn redirects_are_deduplicated() -> Result<()> {
  let query = query_for(&["peterbourgon/gokit", "go-kit/kit"]);
  let body = br#"{"data": {
    "_0": {"nameWithOwner": "go-kit/kit", "url": "https://github.com/go-kit/kit", "stargazerCount": 10},
    "_1": {"nameWithOwner": "go-kit/kit", "url": "https://github.com/go-kit/kit", "stargazerCount": 10}
  }}"#;

  let projects = reconcile(&query, body)?;
  assert_eq!(projects.len(), 1);
  assert_eq!(projects[0].name_with_owner, "go-kit/kit");
  assert_eq!(projects[0].stargazer_count, 10);

  Ok(())
}

#[test]
fn only_not_found_is_empty_success() -> Result<()> {
  let query = query_for(&["a/gone", "b/gone"]);
  let body = br#"{"data": {"_0": null, "_1": null}, "errors": [
    {"message": "Could not resolve to a Repository with the name 'a/gone'.", "type": "NOT_FOUND"},
    {"message": "Could not resolve to a Repository with the name 'b/gone'.", "type": "NOT_FOUND"}
  ]}"#;

  assert_eq!(reconcile(&query, body)?, Vec::new());

  Ok(())
}

#[test]
fn real_error_fails_batch() -> Result<()> {
  let query = query_for(&["a/gone", "b/c"]);
  let body = br#"{"data": {"_0": null, "_1": {"nameWithOwner": "b/c"}}, "errors": [
    {"message": "gone", "type": "NOT_FOUND"},
    {"message": "slow down", "type": "RATE_LIMITED"}
  ]}"#;

  let err = reconcile(&query, body).unwrap_err();
  crate::check_error(
    err,
    &UsageError::QueryFailed {
      count: 1,
      first_message: "slow down".to_owned(),
    },
  )
}

#[test]
fn empty_records_are_dropped() -> Result<()> {
  let query = query_for(&["a/b", "c/d", "e/f"]);
  let body = br#"{"data": {
    "_0": {},
    "_1": {"nameWithOwner": "c/d", "url": "https://github.com/c/d", "forkCount": 2, "isFork": true}
  }}"#;

  let projects = reconcile(&query, body)?;
  assert_eq!(
    projects,
    vec![Project {
      name_with_owner: "c/d".to_owned(),
      url: "https://github.com/c/d".to_owned(),
      fork_count: 2,
      is_fork: true,
      ..Project::default()
    }]
  );

  Ok(())
}

#[test]
fn null_data_is_empty() -> Result<()> {
  let query = query_for(&["a/b"]);
  assert!(reconcile(&query, br#"{"data": null}"#)?.is_empty());
  assert!(reconcile(&query, br#"{}"#)?.is_empty());

  Ok(())
}

#[test]
fn null_errors_is_empty() -> Result<()> {
  let query = query_for(&["a/b"]);
  let projects = reconcile(
    &query,
    br#"{"data": {"_0": {"nameWithOwner": "a/b"}}, "errors": null}"#,
  )?;
  assert_eq!(projects.len(), 1);
  assert_eq!(projects[0].name_with_owner, "a/b");

  Ok(())
}

#[test]
fn both_star_spellings() -> Result<()> {
  let query = query_for(&["a/b", "c/d"]);
  let body = br#"{"data": {
    "_0": {"nameWithOwner": "a/b", "StargazerCount": 5},
    "_1": {"nameWithOwner": "c/d", "stargazerCount": 7}
  }}"#;

  let stars: Vec<_> = reconcile(&query, body)?
    .iter()
    .map(|p| p.stargazer_count)
    .collect();
  assert_eq!(stars, vec![5, 7]);

  Ok(())
}

#[test]
fn malformed_body() -> Result<()> {
  let query = query_for(&["a/b"]);
  let err = reconcile(&query, b"not json").unwrap_err();
  assert!(matches!(
    err.downcast_ref::<UsageError>(),
    Some(UsageError::Parse(_))
  ));

  let err = reconcile(&query, br#"{"data": {"_0": {"forkCount": "many"}}}"#)
    .unwrap_err();
  assert!(matches!(
    err.downcast_ref::<UsageError>(),
    Some(UsageError::Parse(_))
  ));

  Ok(())
}
