//! msbuild-task CLI - build MSBuild projects from the command line

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use msbuild_task::ops::{build, BuildOptions};
use msbuild_task::util::ConfigSources;

mod cli;

use cli::Cli;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("msbuild_task=debug")
    } else {
        EnvFilter::new("msbuild_task=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Config files first, then flags
    let cwd = std::env::current_dir()?;
    let mut config = ConfigSources::discover(&cwd, cli.config.clone()).load()?;
    cli.apply(&mut config);

    let result = build(BuildOptions {
        config,
        projects: cli.projects.clone(),
    })?;

    for file in &result.published {
        if let Some(path) = &file.path {
            println!("{}", path.display());
        }
    }

    Ok(())
}
