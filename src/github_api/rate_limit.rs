use super::{transport_err, GithubClient, UsageError};
use crate::deadline::Deadline;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use std::str::FromStr;

const LIMIT_HEADER: &'static str = "x-ratelimit-limit";
const REMAINING_HEADER: &'static str = "x-ratelimit-remaining";
const RESET_HEADER: &'static str = "x-ratelimit-reset";

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct RateLimitStats {
  pub limit: u64,
  pub remaining: u64,
  pub reset_time: DateTime<Utc>,
}

fn header<T: FromStr>(headers: &HeaderMap, name: &str) -> Result<T> {
  let raw = headers
    .get(name)
    .ok_or_else(|| UsageError::Parse(format!("missing header {}", name)))?;

  let parsed = raw.to_str().ok().and_then(|s| s.trim().parse().ok());
  parsed.ok_or_else(|| {
    UsageError::Parse(format!("header {} is not numeric: {:?}", name, raw))
      .into()
  })
}

pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Result<RateLimitStats> {
  let limit = header(headers, LIMIT_HEADER)?;
  let remaining = header(headers, REMAINING_HEADER)?;
  let reset: i64 = header(headers, RESET_HEADER)?;

  let reset_time = Utc.timestamp_opt(reset, 0).single().ok_or_else(|| {
    UsageError::Parse(format!("reset time {} out of range", reset))
  })?;

  Ok(RateLimitStats {
    limit,
    remaining,
    reset_time,
  })
}

impl GithubClient {
  /// Reads the quota headers off a bodyless request. This costs one point
  /// itself.
  pub fn rate_limit_stats(&self, deadline: &Deadline) -> Result<RateLimitStats> {
    let res = self
      .request(reqwest::Method::HEAD, deadline)?
      .send()
      .map_err(transport_err)?;

    parse_rate_limit_headers(res.headers())
  }
}

#[cfg(test)]
fn headers(items: &[(&'static str, &'static str)]) -> HeaderMap {
  use reqwest::header::HeaderValue;

  let mut map = HeaderMap::new();
  for &(name, value) in items {
    let _ = map.insert(name, HeaderValue::from_static(value));
  }
  map
}

#[test]
fn parses_headers() -> Result<()> {
  let stats = parse_rate_limit_headers(&headers(&[
    ("x-ratelimit-limit", "5000"),
    ("x-ratelimit-remaining", "4999"),
    ("x-ratelimit-reset", "1600000000"),
  ]))?;

  assert_eq!(stats.limit, 5000);
  assert_eq!(stats.remaining, 4999);
  assert_eq!(stats.reset_time.timestamp(), 1_600_000_000);

  Ok(())
}

#[test]
fn missing_header() -> Result<()> {
  let err = parse_rate_limit_headers(&headers(&[
    ("x-ratelimit-limit", "5000"),
    ("x-ratelimit-reset", "1600000000"),
  ]))
  .unwrap_err();

  crate::check_error(
    err,
    &UsageError::Parse("missing header x-ratelimit-remaining".to_owned()),
  )
}

#[test]
fn non_numeric_header() {
  let err = parse_rate_limit_headers(&headers(&[
    ("x-ratelimit-limit", "lots"),
    ("x-ratelimit-remaining", "1"),
    ("x-ratelimit-reset", "1600000000"),
  ]))
  .unwrap_err();

  assert!(matches!(
    err.downcast_ref::<UsageError>(),
    Some(UsageError::Parse(_))
  ));
}
