use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use preloader::{FsMediaLoader, PreloadConfig, Preloader, ScrollLock, StatusLabel};

#[derive(Parser, Debug)]
#[command(name = "preloader", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preload media files from a directory and print progress frames.
    Run(RunArgs),
    /// Print the status text shown for each progress range.
    Labels(LabelsArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Directory standing in for the site root.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Optional JSON config; sources given on the command line replace its resource list.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resource paths, e.g. `/videos/hero.mp4`.
    sources: Vec<String>,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Do not print progress frames.
    #[arg(long)]
    quiet: bool,
}

#[derive(Parser, Debug)]
struct LabelsArgs {
    /// Text shown at 100%.
    #[arg(long)]
    completion_message: Option<String>,
}

/// Stands in for the page's scroll lock; the terminal only reports it.
#[derive(Default)]
struct TerminalScrollLock(AtomicBool);

impl ScrollLock for TerminalScrollLock {
    fn set_locked(&self, locked: bool) {
        if self.0.swap(locked, Ordering::SeqCst) != locked {
            tracing::debug!(locked, "scroll lock changed");
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Labels(args) => cmd_labels(args),
    }
}

fn load_config(args: &RunArgs) -> anyhow::Result<PreloadConfig> {
    let mut cfg = match &args.config {
        Some(path) => PreloadConfig::from_json_file(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PreloadConfig::default(),
    };
    if !args.sources.is_empty() {
        cfg.resources = args.sources.clone();
    }
    cfg.validate().context("validate config")?;
    Ok(cfg)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args)?;
    if !args.root.is_dir() {
        anyhow::bail!("root '{}' is not a directory", args.root.display());
    }

    // Single-threaded: probes interleave on one event loop.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let report = rt.block_on(async {
        let loader = Arc::new(FsMediaLoader::new(&args.root));
        let preloader = Preloader::new(cfg, loader)?;

        let printer = (!args.quiet).then(|| {
            let mut frames = preloader.subscribe();
            tokio::spawn(async move {
                while frames.changed().await.is_ok() {
                    let view = frames.borrow_and_update().clone();
                    eprintln!(
                        "{:>3}%  {:<24} ({}/{})  [{:?}]",
                        view.display_progress,
                        view.status_text,
                        view.asset_counter,
                        view.total,
                        view.phase
                    );
                }
            })
        });

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let lock: Arc<dyn ScrollLock> = Arc::new(TerminalScrollLock::default());
        let report = preloader
            .run_locked(lock, || eprintln!("content revealed"), cancel)
            .await;
        // The session dropped its sender; drain the final frame before exiting.
        if let Some(printer) = printer {
            printer.await.context("progress printer panicked")?;
        }
        anyhow::Ok(report)
    })?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        );
    } else {
        for asset in &report.assets {
            let outcome = asset.outcome.as_ref().map_or("unsettled", |o| o.label());
            eprintln!("  #{} {:<10} {}", asset.index + 1, outcome, asset.source);
        }
        eprintln!(
            "{} of {} assets settled in {} ms ({})",
            report.settled,
            report.total,
            report.elapsed_ms,
            match (report.completed, report.cause) {
                (true, Some(cause)) => format!("completed: {cause:?}"),
                _ => "interrupted".to_string(),
            }
        );
    }
    Ok(())
}

fn cmd_labels(args: LabelsArgs) -> anyhow::Result<()> {
    let done = args
        .completion_message
        .unwrap_or_else(|| PreloadConfig::default().completion_message);
    for (range, sample) in [
        ("0-24", 0),
        ("25-49", 25),
        ("50-74", 50),
        ("75-99", 75),
        ("100", 100),
    ] {
        println!("{range:>6}  {}", StatusLabel::for_progress(sample).text(&done));
    }
    Ok(())
}
