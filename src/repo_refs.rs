use itertools::Itertools;

/// Keeps the import paths hosted on `host`, folds them to `owner/name` and
/// drops duplicates. First occurrence wins.
pub fn extract_repo_refs<S: AsRef<str>>(host: &str, paths: &[S]) -> Vec<String> {
  paths
    .iter()
    .filter_map(|path| {
      let mut parts = path.as_ref().split('/');
      if parts.next() != Some(host) {
        return None;
      }
      let owner = parts.next().filter(|s| !s.is_empty())?;
      let name = parts.next().filter(|s| !s.is_empty())?;
      Some(format!("{}/{}", owner, name).to_lowercase())
    })
    .unique()
    .collect()
}

#[test]
fn filters_and_dedups() {
  let packages = [
    "github.com/dvob/bla",
    "github.com/dvob/Bla",
    "github.com/dvob/bla/foo/bar",
    "not-github.com/foo/bli/bla/blo",
    "github.com/dvob/mod1",
  ];

  assert_eq!(
    extract_repo_refs("github.com", &packages),
    vec!["dvob/bla", "dvob/mod1"]
  );
}

#[test]
fn host_is_case_sensitive() {
  assert_eq!(
    extract_repo_refs("host", &["HOST/a/B", "host/a/b", "host/a/b/x", "other/a/b"]),
    vec!["a/b"]
  );
}

#[test]
fn too_short() {
  assert!(extract_repo_refs("github.com", &["github.com", "github.com/owner"])
    .is_empty());
}

#[test]
fn empty_owner_or_name() {
  assert_eq!(
    extract_repo_refs(
      "github.com",
      &["github.com//weird", "github.com/owner/", "github.com/a/b", "github.com///"]
    ),
    vec!["a/b"]
  );
}

#[cfg(test)]
mod proptests {
  use super::*;
  use proptest::prelude::*;

  fn path() -> impl Strategy<Value = String> {
    (
      prop_oneof![Just("github.com"), Just("gitlab.com"), Just("GitHub.com")],
      prop::collection::vec("[a-zA-Z0-9]{1,4}", 0..5),
    )
      .prop_map(|(host, rest)| {
        std::iter::once(host.to_owned()).chain(rest).join("/")
      })
  }

  proptest! {
    #[test]
    fn only_host_no_duplicates(paths in prop::collection::vec(path(), 0..40)) {
      let refs = extract_repo_refs("github.com", &paths);

      let expected = paths
        .iter()
        .filter(|p| p.starts_with("github.com/") && p.split('/').count() >= 3)
        .count();
      prop_assert!(refs.len() <= expected);

      for r in &refs {
        prop_assert_eq!(r.split('/').count(), 2);
        prop_assert_eq!(r.clone(), r.to_lowercase());
      }
      prop_assert_eq!(refs.iter().unique().count(), refs.len());
    }

    #[test]
    fn idempotent(paths in prop::collection::vec(path(), 0..40)) {
      let refs = extract_repo_refs("github.com", &paths);
      let hosted: Vec<_> = refs.iter().map(|r| format!("github.com/{}", r)).collect();
      prop_assert_eq!(extract_repo_refs("github.com", &hosted), refs);
    }
  }
}
