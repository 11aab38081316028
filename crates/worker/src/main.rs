use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framecast_core::batch::{self, PromptManifest};
use framecast_core::prompt_library::PromptLibrary;
use framecast_events::{EventBus, EventJournal};
use framecast_minimax::MiniMaxApi;
use framecast_pipeline::Scheduler;
use framecast_worker::cli::{Cli, Command, ManifestCommand, PromptsCommand, RunArgs};
use framecast_worker::config::WorkerConfig;
use framecast_worker::reporter;

/// How long background tasks get to finish after the scheduler stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast_worker=info,framecast_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Prompts { command } => prompts(&cli.library, command),
        Command::Manifest { command } => manifest(&cli.library, command),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env().context("Invalid configuration")?;
    args.apply(&mut config);
    tracing::info!(
        images = %args.images.display(),
        output_dir = %config.output_dir.display(),
        model = %config.model,
        max_concurrent = config.max_concurrent,
        "Loaded worker configuration",
    );

    let images = batch::scan_images(&args.images)?;
    let manifest = PromptManifest::load(&args.manifest)?;
    let plan = batch::plan_batch(
        &images,
        &manifest,
        config.videos_per_image,
        &config.output_dir,
        &config.model,
    )?;
    for image in &plan.skipped {
        tracing::warn!(image = %image.display(), "No prompt in manifest, skipping image");
    }
    if plan.requests.is_empty() {
        tracing::warn!("No jobs to run");
        return Ok(());
    }

    // --- Event consumers ---
    let events = Arc::new(EventBus::default());
    let reporter_handle = tokio::spawn(reporter::report_events(events.subscribe()));
    let journal_handle = match &config.event_journal {
        Some(path) => {
            let journal = EventJournal::open(path).await?;
            tracing::info!(path = %journal.path().display(), "Journaling events");
            Some(tokio::spawn(journal.run(events.subscribe())))
        }
        None => None,
    };

    // --- Scheduler ---
    let client = Arc::new(MiniMaxApi::new(config.api_key.clone(), config.base_url.clone()));
    let scheduler = Scheduler::new(config.scheduler_config(), client, Arc::clone(&events))?;
    let job_count = scheduler.enqueue_all(plan.requests).await.len();
    tracing::info!(jobs = job_count, "Batch enqueued");
    scheduler.start().await;

    let progress_cancel = CancellationToken::new();
    let progress_handle = tokio::spawn(reporter::report_progress(
        scheduler.clone(),
        config.stats_interval(),
        progress_cancel.clone(),
    ));

    tokio::select! {
        () = wait_until_drained(&scheduler) => {
            tracing::info!("All jobs finished");
        }
        () = shutdown_signal() => {
            tracing::warn!("Stopping early; submitted jobs keep running remotely");
        }
    }

    // --- Shutdown ---
    scheduler.stop().await;
    progress_cancel.cancel();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, progress_handle).await;

    let snapshot = scheduler.snapshot().await;
    tracing::info!("{}", reporter::describe(&snapshot));

    // Dropping every bus handle closes the channel and ends the consumers.
    drop(scheduler);
    drop(events);
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, reporter_handle).await;
    if let Some(handle) = journal_handle {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
    }

    if snapshot.failed > 0 {
        anyhow::bail!("{} of {} jobs failed", snapshot.failed, snapshot.total);
    }
    Ok(())
}

/// Resolve once nothing is pending or in flight.
async fn wait_until_drained(scheduler: &Scheduler) {
    let mut receiver = scheduler.subscribe();
    while !scheduler.is_drained().await {
        if let Err(broadcast::error::RecvError::Closed) = receiver.recv().await {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C)");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

// ---------------------------------------------------------------------------
// prompts
// ---------------------------------------------------------------------------

fn prompts(library_path: &Path, command: PromptsCommand) -> anyhow::Result<()> {
    let mut library = PromptLibrary::load(library_path);

    match command {
        PromptsCommand::List { category } => {
            let categories = match category {
                Some(category) => vec![category],
                None => library.categories.clone(),
            };
            for category in categories {
                println!("{category}");
                for entry in library.prompts_in(&category) {
                    println!("  {}: {}", entry.name, entry.prompt);
                }
            }
        }
        PromptsCommand::Add {
            category,
            name,
            text,
        } => {
            library.add_prompt(&category, &name, &text)?;
            tracing::info!(
                category = %category,
                name = %name,
                path = %library_path.display(),
                "Prompt saved",
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// manifest
// ---------------------------------------------------------------------------

fn manifest(library_path: &Path, command: ManifestCommand) -> anyhow::Result<()> {
    let ManifestCommand::Init {
        images,
        manifest: manifest_path,
        prompt,
        category,
        name,
        overwrite,
    } = command;

    let prompt = match (prompt, category, name) {
        (Some(prompt), _, _) => prompt,
        (None, Some(category), Some(name)) => {
            let library = PromptLibrary::load(library_path);
            library
                .find(&category, &name)
                .map(|entry| entry.prompt.clone())
                .with_context(|| format!("No prompt named {name:?} in category {category:?}"))?
        }
        _ => anyhow::bail!("Either --prompt or --category with --name is required"),
    };

    let mut manifest = if manifest_path.exists() {
        PromptManifest::load(&manifest_path)?
    } else {
        PromptManifest::default()
    };

    let mut assigned = 0;
    for image in batch::scan_images(&images)? {
        if !overwrite && manifest.prompt_for(&image).is_some() {
            continue;
        }
        manifest.set_prompt(&image, prompt.as_str())?;
        assigned += 1;
    }
    manifest.save(&manifest_path)?;

    tracing::info!(
        path = %manifest_path.display(),
        assigned,
        total = manifest.len(),
        "Manifest written",
    );
    Ok(())
}
