pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod filter;
pub mod observer;
pub mod pagination;
pub mod post;
pub mod remote;
pub mod render;
pub mod storage;
pub mod task;
pub mod task_store;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting twinpane"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let renderer =
    render::Renderer::new(&cfg);
  let ctx = context::AppContext::init(
    cfg,
    cli.data.as_deref()
  )?;

  let result = commands::dispatch(
    &ctx,
    &renderer,
    cli::Command::or_default(
      cli.command
    )
  );
  ctx.teardown()?;
  result?;

  info!("done");
  Ok(())
}
