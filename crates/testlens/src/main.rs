// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testlens: run Go tests and follow their structured results live
//!
//! Discovers the workspace's tests, runs `go test -json` under the active
//! profile, streams compact progress to stderr and writes the full log and
//! end-of-run summary to stdout or a log file.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use testlens::config::{Command, Config, OutputFormat, ReplayArgs, RunArgs};
use testlens::console::ConsoleReporter;
use testlens::logfile::{FileLogSink, StderrLogSink, StdoutLogSink};
use testlens::profile::ProfileStore;
use testlens::replay::{ReplayOptions, replay_file};
use testlens::{Controller, ProfileOverlay, RunScope, SystemSupervisor, Toolchain};
use testlens_core::aggregator::Aggregator;
use testlens_core::identity::TestId;
use testlens_core::sink::LogSink;
use testlens_discovery::{DiscoverOptions, discover};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .with_writer(io::stderr)
        .init();

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(config: Config) -> Result<ExitCode> {
    config.validate()?;
    let workspace = config
        .workspace_path()
        .context("Cannot determine the workspace directory")?;

    match config.effective_command() {
        Command::Run(args) => run_tests(&config, &workspace, args).await,
        Command::List { json } => list_tests(&workspace, json).await,
        Command::Replay(args) => replay(&config, &workspace, args).await,
    }
}

/// Persistent log destination for the chosen output format
fn log_sink(config: &Config, format: OutputFormat) -> Result<Box<dyn LogSink>> {
    Ok(match (&config.log_file, format) {
        (Some(path), _) => Box::new(
            FileLogSink::open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        ),
        // Keep stdout clean for the JSON report.
        (None, OutputFormat::Json) => Box::new(StderrLogSink),
        (None, OutputFormat::Text) => Box::new(StdoutLogSink),
    })
}

async fn run_tests(config: &Config, workspace: &Path, args: RunArgs) -> Result<ExitCode> {
    let discovery = discover(workspace, &DiscoverOptions::default())
        .await
        .with_context(|| format!("Failed to discover tests in {}", workspace.display()))?;

    let scope = RunScope::from_selection(args.group, args.case);
    match &scope {
        RunScope::Group(group) if !discovery.catalog.groups().any(|(g, _)| g == group) => {
            warn!(group = %group, "Group not found among discovered tests");
        }
        RunScope::Case { group, case } if !discovery.catalog.contains(&TestId::new(group, case)) => {
            warn!(group = %group, case = %case, "Case not found among discovered tests");
        }
        _ => {}
    }

    let mut profiles = ProfileStore::load(&config.profiles_path())?;
    if let Some(name) = &config.profile {
        profiles.select(name)?;
    }
    let profiles = ProfileOverlay::new(profiles, args.flags, args.env);

    let reporter = ConsoleReporter::new(io::stderr()).show_output(args.show_output);
    let aggregator = Aggregator::new(
        discovery.catalog,
        workspace.to_path_buf(),
        reporter,
        log_sink(config, args.format)?,
    )
    .verbose(config.verbose)
    .with_filter_policy(args.filter);

    let mut controller = Controller::new(
        aggregator,
        profiles,
        SystemSupervisor,
        Toolchain::with_program(config.program()),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = controller.run(scope, cancel).await?;

    if args.format == OutputFormat::Json {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    }

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn list_tests(workspace: &Path, json: bool) -> Result<ExitCode> {
    let discovery = discover(workspace, &DiscoverOptions::default())
        .await
        .with_context(|| format!("Failed to discover tests in {}", workspace.display()))?;

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &discovery)?;
        writeln!(out)?;
    } else {
        for (group, cases) in discovery.catalog.groups() {
            writeln!(out, "{group}")?;
            for case in cases {
                match &case.span {
                    Some(span) => writeln!(
                        out,
                        "  {} ({}:{})",
                        case.name,
                        span.file.display(),
                        span.start_line
                    )?,
                    None => writeln!(out, "  {}", case.name)?,
                }
            }
        }
        writeln!(
            out,
            "{} tests in {} files",
            discovery.catalog.len(),
            discovery.files_scanned
        )?;
    }
    for warning in &discovery.warnings {
        warn!("{warning}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn replay(config: &Config, workspace: &Path, args: ReplayArgs) -> Result<ExitCode> {
    let reporter = ConsoleReporter::new(io::stderr());
    let sink = log_sink(config, args.format)?;
    let options = ReplayOptions {
        filter: args.filter,
        verbose: config.verbose,
    };
    let (summary, stats) = replay_file(&args.file, workspace, reporter, sink, options).await?;

    if args.format == OutputFormat::Json {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(
            &mut out,
            &serde_json::json!({ "stats": stats, "summary": summary }),
        )?;
        writeln!(out)?;
    }

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
