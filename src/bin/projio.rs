//! projio - inspect a project's artifact layout
//!
//! Usage:
//!   projio describe
//!   projio templates
//!   projio resolve checkpoint --run exp1 --set name=model.ckpt
//!   projio tree lightning --depth 2 --files
//!
//! Configuration comes from `PROJIO_CONFIG` / `PROJIO_*` unless `--config`
//! names a file. Set `RUST_LOG=projio=debug` to trace resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use projio::{
    validate_run, ProjectConfig, ProjectPaths, ResolveOptions, ResolvedPath, SettingsOverride,
    TreeOptions,
};

#[derive(Parser, Debug)]
#[command(name = "projio")]
#[command(about = "Resolve and inspect experiment artifact paths")]
struct Args {
    /// YAML configuration file (overrides PROJIO_CONFIG)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Project root
    #[arg(long, short = 'r')]
    root: Option<PathBuf>,

    /// Compute paths without creating directories
    #[arg(long, short = 'n')]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print roots, settings and template names as JSON
    Describe,

    /// List registered templates
    Templates,

    /// Resolve a registered template
    Resolve {
        /// Template name
        template: String,

        /// Run name (inserted as a directory and bound to {run}/{variant})
        #[arg(long)]
        run: Option<String>,

        /// Placeholder values in format key=value (can be specified multiple times)
        #[arg(long, short = 's', value_parser = parse_key_val)]
        set: Vec<(String, String)>,

        /// Force a datestamp
        #[arg(long, conflicts_with = "no_datestamp")]
        datestamp: bool,

        /// Suppress the datestamp
        #[arg(long)]
        no_datestamp: bool,

        /// Do not create directories
        #[arg(long)]
        no_create: bool,
    },

    /// Print a directory tree
    Tree {
        /// Directory (relative to the project root)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Levels to descend
        #[arg(long, short = 'd', default_value_t = 3)]
        depth: usize,

        /// Include files
        #[arg(long, short = 'f')]
        files: bool,
    },
}

/// Parse key=value pairs from command line
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: {}", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn load_project(args: &Args) -> Result<ProjectPaths> {
    let config = match &args.config {
        Some(path) => ProjectConfig::load(path)?
            .apply_env_overrides(|key| std::env::var(key).ok())?,
        None => ProjectConfig::from_env()?,
    };

    let mut paths = ProjectPaths::from_config(&config);
    if let Some(root) = &args.root {
        paths.set_root(root);
    }
    if args.dry_run {
        paths = paths.using(&SettingsOverride::new().dry_run(true));
    }
    Ok(paths)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let paths = load_project(&args)?;

    match args.command {
        Command::Describe => {
            let json = serde_json::to_string_pretty(&paths.describe())
                .context("Failed to serialize project description")?;
            println!("{}", json);
        }

        Command::Templates => {
            for spec in paths.templates().iter() {
                println!(
                    "{:<20} {:<8} {}",
                    spec.name(),
                    spec.root(),
                    spec.pattern().shape()
                );
            }
        }

        Command::Resolve {
            template,
            run,
            set,
            datestamp,
            no_datestamp,
            no_create,
        } => {
            if let Some(run) = &run {
                validate_run(run).with_context(|| format!("Invalid --run '{}'", run))?;
            }
            let mut options = ResolveOptions::new();
            options.variant = run;
            options.substitutions.extend(set);
            if datestamp {
                options.datestamp = Some(true);
            } else if no_datestamp {
                options.datestamp = Some(false);
            }
            if no_create {
                options.create = Some(false);
            }

            let resolved = paths
                .template_path(&template, &options)
                .with_context(|| format!("Failed to resolve template '{}'", template))?;
            match resolved {
                ResolvedPath::Single(path) => println!("{}", path.display()),
                ResolvedPath::Named(files) => {
                    for (key, path) in files {
                        println!("{}\t{}", key, path.display());
                    }
                }
            }
        }

        Command::Tree { path, depth, files } => {
            let options = TreeOptions {
                max_depth: depth,
                include_files: files,
            };
            println!("{}", paths.tree(&path, &options));
        }
    }

    Ok(())
}
