use project_usage::{
  collect_projects,
  github_api::{get_token, GithubClient, GITHUB_HOST},
  importers::GodocImporters,
  report::{write_rate_limit, write_report, Filter, SortKey},
  Deadline, Options,
};
use std::{env, io, process, time::Duration};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
  name = "project_usage",
  about = "list the github projects which import a package, sorted by stars",
  after_help = "EXAMPLES:\n    project_usage github.com/nats-io/nats.go"
)]
struct Opt {
  /// Package whose importers are listed.
  #[structopt(required_unless = "limit")]
  package: Option<String>,

  /// Personal Access Token for Github. If not set environment variable
  /// GITHUB_TOKEN is used.
  #[structopt(long)]
  token: Option<String>,

  /// Show Github rate limit stats and exit. Fetching the stats also costs
  /// one point.
  #[structopt(long)]
  limit: bool,

  #[structopt(long, default_value = "stars", possible_values = SortKey::VARIANTS)]
  sort: SortKey,

  /// Leave out projects which are forks.
  #[structopt(long)]
  exclude_forks: bool,

  /// Leave out archived projects.
  #[structopt(long)]
  exclude_archived: bool,

  /// Give up on the whole run after this many seconds.
  #[structopt(long)]
  timeout: Option<u64>,
}

fn run() -> anyhow::Result<()> {
  let opt = Opt::from_args();

  let token = get_token(opt.token)?;
  let deadline = opt
    .timeout
    .map(|secs| Deadline::after(Duration::from_secs(secs)))
    .unwrap_or_default();
  let github = GithubClient::new(token)?;

  let stdout = io::stdout();
  let mut out = stdout.lock();

  if opt.limit {
    let stats = github.rate_limit_stats(&deadline)?;
    return write_rate_limit(&mut out, &stats);
  }

  let options = Options {
    package: opt.package.unwrap_or_default(),
    host: env::var("GITHUB_HOST").unwrap_or_else(|_| GITHUB_HOST.to_owned()),
    sort: opt.sort,
    filter: Filter {
      exclude_forks: opt.exclude_forks,
      exclude_archived: opt.exclude_archived,
    },
  };

  let projects =
    collect_projects(&options, &GodocImporters::new()?, &github, &deadline)?;

  write_report(&mut out, &projects)
}

pub fn main() {
  env_logger::Builder::from_env(
    env_logger::Env::default().default_filter_or("warn"),
  )
  .init();

  if let Err(err) = run() {
    eprintln!("{:#}", err);
    process::exit(1);
  }
}
