use crate::{
  deadline::Deadline,
  github_api::{get_projects, GraphqlTransport, Project, UsageError},
  importers::{ImporterSource, IMPORTERS_LIMIT},
  repo_refs::extract_repo_refs,
  report::{filter_projects, sort_projects, Filter, SortKey},
};
use anyhow::Result;

const LOG_TARGET: &'static str = "pipeline";

#[derive(Debug, Clone)]
pub struct Options {
  pub package: String,
  /// Only import paths under this host are looked up.
  pub host: String,
  pub sort: SortKey,
  pub filter: Filter,
}

/// importers -> repo refs -> one aggregate query -> sorted projects.
/// Nothing is returned unless every step succeeds.
pub fn collect_projects(
  options: &Options,
  importers: &impl ImporterSource,
  transport: &impl GraphqlTransport,
  deadline: &Deadline,
) -> Result<Vec<Project>> {
  let listing = importers.importers(&options.package, deadline)?;

  if listing.truncated {
    log::warn!(
      target: LOG_TARGET,
      "project is imported by more than {} packages. we only show results \
       for the first {}.",
      IMPORTERS_LIMIT,
      IMPORTERS_LIMIT
    );
  }

  let repo_refs = extract_repo_refs(&options.host, &listing.paths);
  log::debug!(
    target: LOG_TARGET,
    "{} importers map to {} repos on {}",
    listing.paths.len(),
    repo_refs.len(),
    options.host
  );

  if repo_refs.is_empty() {
    return Err(
      UsageError::NoResults {
        package: options.package.clone(),
      }
      .into(),
    );
  }

  let mut projects = get_projects(transport, &repo_refs, deadline)?;
  filter_projects(&mut projects, options.filter);
  sort_projects(&mut projects, options.sort);

  Ok(projects)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{check_error, importers::Importers, report::write_report};
  use std::cell::RefCell;

  struct FakeImporters(Vec<&'static str>);

  impl ImporterSource for FakeImporters {
    fn importers(&self, _: &str, deadline: &Deadline) -> Result<Importers> {
      deadline.remaining()?;
      Ok(Importers::new(self.0.iter().map(|s| (*s).to_owned()).collect()))
    }
  }

  struct FakeGithub {
    body: &'static str,
    queries: RefCell<Vec<String>>,
  }

  impl FakeGithub {
    fn new(body: &'static str) -> Self {
      Self {
        body,
        queries: RefCell::new(Vec::new()),
      }
    }
  }

  impl GraphqlTransport for FakeGithub {
    fn post_query(&self, query: &str, deadline: &Deadline) -> Result<Vec<u8>> {
      deadline.remaining()?;
      self.queries.borrow_mut().push(query.to_owned());
      Ok(self.body.as_bytes().to_vec())
    }
  }

  fn options() -> Options {
    Options {
      package: "github.com/x/y".to_owned(),
      host: "github.com".to_owned(),
      sort: SortKey::Stars,
      filter: Filter::default(),
    }
  }

  #[test]
  fn end_to_end() -> Result<()> {
    let importers =
      FakeImporters(vec!["github.com/a/b", "github.com/a/B", "other.com/a/b"]);
    let github = FakeGithub::new(
      r#"{"data":{"_0":{"nameWithOwner":"a/b","url":"https://x/a/b","StargazerCount":5}}}"#,
    );

    let projects =
      collect_projects(&options(), &importers, &github, &Deadline::none())?;

    let queries = github.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].matches(": repository(").count(), 1);
    assert!(queries[0].contains(r#"_0: repository(name: "b", owner: "a")"#));

    let mut out = Vec::new();
    write_report(&mut out, &projects)?;
    let out = String::from_utf8(out)?;
    let rows: Vec<Vec<&str>> = out
      .lines()
      .map(|line| line.split_whitespace().collect())
      .collect();
    assert_eq!(
      rows,
      vec![
        vec!["STARS", "FORKS", "PROJECT"],
        vec!["5", "0", "https://x/a/b"]
      ]
    );

    Ok(())
  }

  #[test]
  fn no_hosted_importers() -> Result<()> {
    let importers = FakeImporters(vec!["other.com/a/b", "github.com/short"]);
    let github = FakeGithub::new("{}");

    let err = collect_projects(&options(), &importers, &github, &Deadline::none())
      .unwrap_err();

    assert!(github.queries.borrow().is_empty());
    check_error(
      err,
      &UsageError::NoResults {
        package: "github.com/x/y".to_owned(),
      },
    )
  }

  #[test]
  fn sorted_and_deduplicated() -> Result<()> {
    let importers = FakeImporters(vec![
      "github.com/old/name/pkg",
      "github.com/new/name",
      "github.com/c/d",
    ]);
    let github = FakeGithub::new(
      r#"{"data":{
        "_0":{"nameWithOwner":"new/name","url":"https://github.com/new/name","stargazerCount":9},
        "_1":{"nameWithOwner":"new/name","url":"https://github.com/new/name","stargazerCount":9},
        "_2":{"nameWithOwner":"c/d","url":"https://github.com/c/d","stargazerCount":2}
      }}"#,
    );

    let projects =
      collect_projects(&options(), &importers, &github, &Deadline::none())?;
    let names: Vec<_> =
      projects.iter().map(|p| p.name_with_owner.as_str()).collect();
    assert_eq!(names, vec!["c/d", "new/name"]);

    Ok(())
  }

  #[test]
  fn malformed_importer_paths_are_skipped() -> Result<()> {
    let importers = FakeImporters(vec!["github.com/a/b", "github.com//weird"]);
    let github = FakeGithub::new(
      r#"{"data":{"_0":{"nameWithOwner":"a/b","url":"https://github.com/a/b"}}}"#,
    );

    let projects =
      collect_projects(&options(), &importers, &github, &Deadline::none())?;
    assert_eq!(projects.len(), 1);
    assert_eq!(github.queries.borrow()[0].matches(": repository(").count(), 1);

    Ok(())
  }

  #[test]
  fn query_failure_is_fatal() -> Result<()> {
    let importers = FakeImporters(vec!["github.com/a/b"]);
    let github = FakeGithub::new(
      r#"{"data":{"_0":null},"errors":[{"message":"too many","type":"RATE_LIMITED"}]}"#,
    );

    let err = collect_projects(&options(), &importers, &github, &Deadline::none())
      .unwrap_err();
    check_error(
      err,
      &UsageError::QueryFailed {
        count: 1,
        first_message: "too many".to_owned(),
      },
    )
  }

  #[test]
  fn expired_deadline_aborts() -> Result<()> {
    let importers = FakeImporters(vec!["github.com/a/b"]);
    let github = FakeGithub::new("{}");

    let err = collect_projects(
      &options(),
      &importers,
      &github,
      &Deadline::at(std::time::Instant::now()),
    )
    .unwrap_err();

    assert!(github.queries.borrow().is_empty());
    check_error(err, &UsageError::DeadlineExceeded)
  }
}
