pub mod deadline;
pub mod github_api;
pub mod importers;
pub mod pipeline;
pub mod repo_refs;
pub mod report;

pub use deadline::Deadline;
pub use github_api::{Project, UsageError};
pub use pipeline::{collect_projects, Options};

#[cfg(test)]
fn check_error(err: anyhow::Error, expected: &UsageError) -> anyhow::Result<()> {
  assert_eq!(
    match err.downcast_ref::<UsageError>() {
      Some(err) => err,
      None => return Err(err),
    },
    expected,
  );

  Ok(())
}
