use super::UsageError;
use anyhow::Result;
use itertools::Itertools;
use std::fmt;

const REPO_FIELDS: &'static str =
  "nameWithOwner url forkCount isFork isArchived isInOrganization stargazerCount";

#[derive(Hash, Ord, PartialOrd, PartialEq, Eq, Debug, Clone)]
pub struct RepoRef {
  pub owner: String,
  pub name: String,
}

impl RepoRef {
  pub fn parse(owner_name: &str) -> Result<Self> {
    let mut items = owner_name.split('/');
    match (items.next(), items.next(), items.next()) {
      (Some(owner), Some(name), None)
        if !owner.is_empty() && !name.is_empty() =>
      {
        Ok(Self {
          owner: owner.to_owned(),
          name: name.to_owned(),
        })
      }
      _ => Err(UsageError::Format(owner_name.to_owned()).into()),
    }
  }
}

impl fmt::Display for RepoRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.name)
  }
}

/// One batched query plus the alias each repo was bound to. Alias `_i` is
/// always the i-th input repo.
#[derive(Debug, Clone)]
pub struct AliasedQuery {
  pub document: String,
  pub aliases: Vec<(String, RepoRef)>,
}

impl AliasedQuery {
  pub fn len(&self) -> usize {
    self.aliases.len()
  }

  pub fn is_empty(&self) -> bool {
    self.aliases.is_empty()
  }
}

fn alias(i: usize) -> String {
  format!("_{}", i)
}

/// JSON string escaping produces a valid GraphQL string literal.
fn string_literal(value: &str) -> String {
  serde_json::Value::String(value.to_owned()).to_string()
}

pub fn build_query<S: AsRef<str>>(repo_refs: &[S]) -> Result<AliasedQuery> {
  let aliases = repo_refs
    .iter()
    .enumerate()
    .map(|(i, repo_ref)| Ok((alias(i), RepoRef::parse(repo_ref.as_ref())?)))
    .collect::<Result<Vec<_>>>()?;

  let document = aliases
    .iter()
    .map(|(alias, repo)| {
      format!(
        "{}: repository(name: {}, owner: {}) {{{}}}\n",
        alias,
        string_literal(&repo.name),
        string_literal(&repo.owner),
        REPO_FIELDS
      )
    })
    .join("");
  let document = format!("{{\n{}}}", document);

  Ok(AliasedQuery { document, aliases })
}

#[test]
fn empty_query_is_well_formed() -> Result<()> {
  let q = build_query::<&str>(&[])?;
  assert_eq!(q.document, "{\n}");
  assert!(q.is_empty());

  Ok(())
}

#[test]
fn single_repo() -> Result<()> {
  let q = build_query(&["o/n"])?;
  assert_eq!(
    q.document,
    "{\n_0: repository(name: \"n\", owner: \"o\") {nameWithOwner url \
     forkCount isFork isArchived isInOrganization stargazerCount}\n}"
  );
  assert_eq!(
    q.aliases,
    vec![(
      "_0".to_owned(),
      RepoRef {
        owner: "o".to_owned(),
        name: "n".to_owned()
      }
    )]
  );

  Ok(())
}

#[test]
fn aliases_follow_input_order() -> Result<()> {
  let q = build_query(&["a/b", "c/d", "e/f"])?;
  let names: Vec<_> = q
    .aliases
    .iter()
    .map(|(alias, repo)| format!("{}={}", alias, repo))
    .collect();
  assert_eq!(names, vec!["_0=a/b", "_1=c/d", "_2=e/f"]);
  assert!(q.document.contains("_2: repository(name: \"f\", owner: \"e\")"));

  Ok(())
}

#[test]
fn quotes_are_escaped() -> Result<()> {
  let q = build_query(&["o/we\"ird"])?;
  assert!(q.document.contains(r#"name: "we\"ird""#));

  Ok(())
}

#[test]
fn bad_format() -> Result<()> {
  for bad in &["bad", "a/b/c", "/b", "a/", ""] {
    let err = build_query(&[*bad]).unwrap_err();
    crate::check_error(err, &UsageError::Format((*bad).to_owned()))?;
  }

  Ok(())
}

#[cfg(test)]
mod proptests {
  use super::*;
  use proptest::prelude::*;

  proptest! {
    #[test]
    fn one_alias_per_repo(repos in prop::collection::vec("[a-z0-9]{1,8}/[a-z0-9.-]{1,8}", 0..50)) {
      let q = build_query(&repos).unwrap();
      prop_assert_eq!(q.len(), repos.len());
      for (i, (alias, repo)) in q.aliases.iter().enumerate() {
        prop_assert_eq!(alias, &format!("_{}", i));
        prop_assert_eq!(repo.to_string(), repos[i].clone());
      }
      prop_assert_eq!(q.document.matches(": repository(").count(), repos.len());
    }
  }
}
