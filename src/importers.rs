//! Lookup of the packages importing a given package.

use crate::{
  deadline::Deadline,
  github_api::{transport_err, UsageError},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

pub const IMPORTERS_ENDPOINT: &'static str = "https://api.godoc.org/importers";
/// The listing stops at this many importers.
pub const IMPORTERS_LIMIT: usize = 20000;
const LOG_TARGET: &'static str = "importers";

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Importers {
  pub paths: Vec<String>,
  /// The listing hit `IMPORTERS_LIMIT` and more importers likely exist.
  pub truncated: bool,
}

impl Importers {
  pub fn new(paths: Vec<String>) -> Self {
    let truncated = paths.len() >= IMPORTERS_LIMIT;
    Self { paths, truncated }
  }
}

pub trait ImporterSource {
  fn importers(&self, package: &str, deadline: &Deadline) -> Result<Importers>;
}

#[derive(Deserialize)]
struct ImportersResponse {
  #[serde(default)]
  results: Vec<ImporterEntry>,
}

#[derive(Deserialize)]
struct ImporterEntry {
  path: String,
}

pub fn parse_importers(body: &[u8]) -> Result<Importers> {
  let response: ImportersResponse = serde_json::from_slice(body)
    .map_err(|e| UsageError::Parse(e.to_string()))?;

  Ok(Importers::new(
    response.results.into_iter().map(|entry| entry.path).collect(),
  ))
}

/// The listing is only usable on a plain 200.
fn check_status(status: reqwest::StatusCode) -> Result<()> {
  if status != reqwest::StatusCode::OK {
    return Err(
      UsageError::Transport(format!("status code error: {}", status)).into(),
    );
  }

  Ok(())
}

#[derive(Debug, Clone)]
pub struct GodocImporters {
  client: reqwest::blocking::Client,
  endpoint: String,
}

impl GodocImporters {
  pub fn new() -> Result<Self> {
    let endpoint = env::var("IMPORTERS_URL")
      .unwrap_or_else(|_| IMPORTERS_ENDPOINT.to_owned());
    Self::with_endpoint(endpoint)
  }

  pub fn with_endpoint(endpoint: String) -> Result<Self> {
    let client = reqwest::blocking::Client::builder()
      .user_agent("project_usage/0.1.0")
      .build()
      .context("failed to build http client")?;

    Ok(Self { client, endpoint })
  }
}

impl ImporterSource for GodocImporters {
  fn importers(&self, package: &str, deadline: &Deadline) -> Result<Importers> {
    let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), package);
    log::debug!(target: LOG_TARGET, "fetching {}", url);

    let mut builder = self.client.get(&url);
    if let Some(remaining) = deadline.remaining()? {
      builder = builder.timeout(remaining);
    }
    let res = builder.send().map_err(transport_err)?;

    check_status(res.status())?;

    let body = res.bytes().map_err(transport_err)?;
    let importers = parse_importers(&body)?;
    log::debug!(
      target: LOG_TARGET,
      "{} imports {} packages",
      package,
      importers.paths.len()
    );

    Ok(importers)
  }
}

#[test]
fn parse_listing() -> Result<()> {
  let importers = parse_importers(
    br#"{"results": [{"path": "github.com/a/b"}, {"path": "example.org/x"}]}"#,
  )?;

  assert_eq!(
    importers,
    Importers {
      paths: vec!["github.com/a/b".to_owned(), "example.org/x".to_owned()],
      truncated: false,
    }
  );

  Ok(())
}

#[test]
fn empty_listing() -> Result<()> {
  assert_eq!(parse_importers(br#"{"results": []}"#)?, Importers::default());
  assert_eq!(parse_importers(br#"{}"#)?, Importers::default());

  Ok(())
}

#[test]
fn truncated_listing() {
  let paths = vec!["github.com/a/b".to_owned(); IMPORTERS_LIMIT];
  assert!(Importers::new(paths).truncated);
}

#[test]
fn malformed_listing() {
  let err = parse_importers(b"<html></html>").unwrap_err();
  assert!(matches!(
    err.downcast_ref::<UsageError>(),
    Some(UsageError::Parse(_))
  ));
}

#[test]
fn only_ok_status_is_accepted() -> Result<()> {
  check_status(reqwest::StatusCode::OK)?;

  for code in &[204, 301, 404, 500] {
    let status = reqwest::StatusCode::from_u16(*code)?;
    let err = check_status(status).unwrap_err();
    crate::check_error(
      err,
      &UsageError::Transport(format!("status code error: {}", status)),
    )?;
  }

  Ok(())
}
