use crate::github_api::{Project, RateLimitStats};
use anyhow::{anyhow, Result};
use std::{io::Write, str::FromStr};

const HEADER: [&'static str; 3] = ["STARS", "FORKS", "PROJECT"];
const PADDING: usize = 2;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SortKey {
  Stars,
  Forks,
}

impl SortKey {
  pub const VARIANTS: &'static [&'static str] = &["stars", "forks"];

  fn of(self, project: &Project) -> u64 {
    match self {
      Self::Stars => project.stargazer_count,
      Self::Forks => project.fork_count,
    }
  }
}

impl Default for SortKey {
  fn default() -> Self {
    Self::Stars
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "stars" => Ok(Self::Stars),
      "forks" => Ok(Self::Forks),
      _ => Err(anyhow!("unknown sort key: {}", s)),
    }
  }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Filter {
  pub exclude_forks: bool,
  pub exclude_archived: bool,
}

impl Filter {
  fn keeps(&self, project: &Project) -> bool {
    !(self.exclude_forks && project.is_fork)
      && !(self.exclude_archived && project.is_archived)
  }
}

pub fn filter_projects(projects: &mut Vec<Project>, filter: Filter) {
  projects.retain(|p| filter.keeps(p));
}

/// Ascending and stable: equal keys keep their relative order.
pub fn sort_projects(projects: &mut [Project], key: SortKey) {
  projects.sort_by_key(|p| key.of(p));
}

/// Widest cell plus padding, for every column but the last.
fn column_widths(rows: &[[String; 3]]) -> [usize; 2] {
  let mut widths = [HEADER[0].len(), HEADER[1].len()];
  for row in rows {
    for (width, cell) in widths.iter_mut().zip(row.iter()) {
      *width = (*width).max(cell.len());
    }
  }
  [widths[0] + PADDING, widths[1] + PADDING]
}

pub fn write_report(out: &mut impl Write, projects: &[Project]) -> Result<()> {
  let rows: Vec<[String; 3]> = projects
    .iter()
    .map(|p| {
      [
        p.stargazer_count.to_string(),
        p.fork_count.to_string(),
        p.url.clone(),
      ]
    })
    .collect();

  let widths = column_widths(&rows);

  let mut write_row = |cells: [&str; 3]| -> Result<()> {
    writeln!(
      out,
      "{:<w0$}{:<w1$}{}",
      cells[0],
      cells[1],
      cells[2],
      w0 = widths[0],
      w1 = widths[1]
    )?;
    Ok(())
  };

  write_row(HEADER)?;
  for row in &rows {
    write_row([row[0].as_str(), row[1].as_str(), row[2].as_str()])?;
  }
  out.flush()?;

  Ok(())
}

pub fn write_rate_limit(out: &mut impl Write, stats: &RateLimitStats) -> Result<()> {
  writeln!(out, "limit: {}", stats.limit)?;
  writeln!(out, "remaining: {}", stats.remaining)?;
  writeln!(out, "reset time: {}", stats.reset_time.to_rfc3339())?;
  out.flush()?;

  Ok(())
}

#[cfg(test)]
fn project(name: &str, stars: u64, forks: u64) -> Project {
  Project {
    name_with_owner: name.to_owned(),
    url: format!("https://github.com/{}", name),
    stargazer_count: stars,
    fork_count: forks,
    ..Project::default()
  }
}

#[test]
fn sort_is_stable() {
  let mut projects = vec![
    project("a/first", 5, 0),
    project("a/b", 3, 0),
    project("a/second", 5, 0),
    project("a/c", 1, 0),
  ];
  sort_projects(&mut projects, SortKey::Stars);

  let names: Vec<_> = projects.iter().map(|p| p.name_with_owner.as_str()).collect();
  assert_eq!(names, vec!["a/c", "a/b", "a/first", "a/second"]);
}

#[test]
fn sort_by_forks() {
  let mut projects = vec![project("a/b", 1, 9), project("c/d", 9, 1)];
  sort_projects(&mut projects, SortKey::Forks);

  assert_eq!(projects[0].name_with_owner, "c/d");
}

#[test]
fn filters() {
  let mut projects = vec![
    Project {
      is_fork: true,
      ..project("a/fork", 1, 1)
    },
    Project {
      is_archived: true,
      ..project("a/archived", 1, 1)
    },
    project("a/b", 1, 1),
  ];

  filter_projects(
    &mut projects,
    Filter {
      exclude_forks: true,
      exclude_archived: false,
    },
  );
  assert_eq!(projects.len(), 2);

  filter_projects(
    &mut projects,
    Filter {
      exclude_forks: true,
      exclude_archived: true,
    },
  );
  assert_eq!(projects, vec![project("a/b", 1, 1)]);
}

#[test]
fn report_is_aligned() -> Result<()> {
  let mut out = Vec::new();
  write_report(&mut out, &[project("a/b", 5, 0), project("c/d", 12345, 7)])?;

  assert_eq!(
    String::from_utf8(out)?,
    "STARS  FORKS  PROJECT\n\
     5      0      https://github.com/a/b\n\
     12345  7      https://github.com/c/d\n"
  );

  Ok(())
}

#[test]
fn empty_report_has_header() -> Result<()> {
  let mut out = Vec::new();
  write_report(&mut out, &[])?;
  assert_eq!(String::from_utf8(out)?, "STARS  FORKS  PROJECT\n");

  Ok(())
}

#[test]
fn parse_sort_key() -> Result<()> {
  assert_eq!("stars".parse::<SortKey>()?, SortKey::Stars);
  assert_eq!("forks".parse::<SortKey>()?, SortKey::Forks);
  assert!("bananas".parse::<SortKey>().is_err());

  Ok(())
}

#[test]
fn rate_limit_stats() -> Result<()> {
  use chrono::{TimeZone, Utc};

  let mut out = Vec::new();
  write_rate_limit(
    &mut out,
    &RateLimitStats {
      limit: 5000,
      remaining: 4321,
      reset_time: Utc.timestamp_opt(0, 0).unwrap(),
    },
  )?;

  assert_eq!(
    String::from_utf8(out)?,
    "limit: 5000\nremaining: 4321\nreset time: 1970-01-01T00:00:00+00:00\n"
  );

  Ok(())
}
