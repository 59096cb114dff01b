//! app-reloader - push app bundles to devices, stream their logs and mirror
//! their screens
//!
//! This is the binary entry point. All logic lives in the workspace crates.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use reloader_app::{
    debug_session, init_config_dir, load_settings, push_app, spawn_signal_handler,
    OrchestratorReport, Settings, Workflow, WORKFLOW_PROMPT,
};
use reloader_core::{DebugEvent, Error, TransferOutcome};

/// app-reloader - live delivery and debugging for mobile apps
#[derive(Parser, Debug)]
#[command(name = "reloader")]
#[command(about = "Push app bundles to devices, stream device logs and mirror screens", long_about = None)]
struct Args {
    /// Path to the app project (defaults to the current directory)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send the packaged app to every configured device
    Push {
        /// Artifact to send instead of build.artifact
        #[arg(long, value_name = "FILE")]
        artifact: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stream device logs and mirror the screen until Ctrl+C
    Debug,
    /// Write a default .reloader/config.toml
    Init,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    let args = Args::parse();
    color_eyre::install()?;

    if let Err(e) = reloader_core::logging::init() {
        eprintln!("Logging disabled: {}", e);
    }

    let project = args
        .path
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    info!("app-reloader starting in {}", project.display());

    let result = match args.command {
        Some(Command::Init) => init(&project),
        Some(Command::Push { artifact, json }) => {
            push(&load_settings(&project), &project, artifact.as_deref(), json).await
        }
        Some(Command::Debug) => debug(&load_settings(&project), &project, None).await,
        None => interactive(&load_settings(&project), &project).await,
    };

    if let Err(ref e) = result {
        error!("Application error: {:?}", e);
    }
    info!("app-reloader exiting");
    result
}

fn init(project: &Path) -> color_eyre::Result<()> {
    if init_config_dir(project)? {
        println!("Created {}", reloader_app::config::config_path(project).display());
    } else {
        println!(
            "{} already exists, left unchanged",
            reloader_app::config::config_path(project).display()
        );
    }
    Ok(())
}

async fn push(
    settings: &Settings,
    project: &Path,
    artifact: Option<&Path>,
    json: bool,
) -> color_eyre::Result<()> {
    let report = push_app(settings, project, artifact).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        return Ok(());
    }

    for session in &report.sessions {
        match session.outcome {
            TransferOutcome::Delivered => {
                println!("Sent {} bytes to {}", session.bytes_sent, session.target)
            }
            _ => println!(
                "Couldn't send to {}: {}",
                session.target,
                session.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "Sent app to {} device(s), {} failed",
        report.summary.delivered, report.summary.failed
    );
    Ok(())
}

async fn interactive(settings: &Settings, project: &Path) -> color_eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let workflow = loop {
        println!("{}", WORKFLOW_PROMPT);
        let Some(line) = lines.next_line().await? else {
            return Err(eyre!("No option chosen"));
        };
        match line.parse::<Workflow>() {
            Ok(workflow) => break workflow,
            Err(e) => println!("{}", e),
        }
    };

    debug(settings, project, Some(workflow)).await
}

/// Run a debug session (after building, for `Workflow::CompileAndDebug`)
/// until the devices go away or Ctrl+C.
async fn debug(
    settings: &Settings,
    project: &Path,
    workflow: Option<Workflow>,
) -> color_eyre::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let (event_tx, event_rx) = mpsc::channel(256);
    let printer = tokio::spawn(print_events(event_rx));

    let result = match workflow {
        Some(workflow) => workflow.run(settings, project, event_tx, shutdown_rx).await,
        None => debug_session(settings, project, event_tx, shutdown_rx).await,
    };

    // Every sender is gone once the session returns
    if let Err(e) = printer.await {
        error!("Event printer failed: {}", e);
    }

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(Error::Interrupted) => {
            println!("Interrupted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_events(mut event_rx: mpsc::Receiver<DebugEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            DebugEvent::LogLine { device, line, at } => match device {
                Some(device) => println!("[{}] {} {}", at.format("%H:%M:%S"), device, line),
                None => println!("[{}] {}", at.format("%H:%M:%S"), line),
            },
            DebugEvent::DeviceUnreachable { address } => {
                println!("Device {} is not reachable, skipping", address)
            }
            DebugEvent::StreamEnded { device, code } => println!(
                "Log stream for {} ended (code {:?})",
                device.as_deref().unwrap_or("cable device"),
                code
            ),
            DebugEvent::MirrorStarted { pid } => println!("Mirroring started (pid {:?})", pid),
            DebugEvent::MirrorAlreadyRunning => println!("Mirroring already running"),
            DebugEvent::MirrorExited { code } => println!("Mirror window closed (code {:?})", code),
        }
    }
}

fn print_report(report: &OrchestratorReport) {
    for e in &report.errors {
        eprintln!("{}", e);
    }
    if report.interrupted {
        println!("Debug session stopped");
    }
}
