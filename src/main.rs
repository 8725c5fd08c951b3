use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, SubCommand};
use spacetraveling::build::build_site;
use spacetraveling::config::Config;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = App::new("spacetraveling")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Fetches the posts and renders the site")
                .arg(
                    Arg::with_name("project")
                        .short("p")
                        .long("project")
                        .takes_value(true)
                        .default_value(".")
                        .help("The project directory (or any directory beneath it)"),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .default_value("_output")
                        .help("The directory in which the site is written"),
                ),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("build") {
        // both arguments have defaults
        let project = Path::new(matches.value_of("project").unwrap_or("."));
        let output = Path::new(matches.value_of("output").unwrap_or("_output"));
        let project = std::fs::canonicalize(project)
            .with_context(|| format!("resolving '{}'", project.display()))?;
        let config = Config::from_directory(&project, output)
            .with_context(|| format!("loading project from '{}'", project.display()))?;
        build_site(config).context("building site")?;
    }
    Ok(())
}
