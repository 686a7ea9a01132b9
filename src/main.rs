use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use webshell::config::ShellConfig;
use webshell::lifecycle::Lifecycle;
use webshell::package;
use webshell::resources::ResourceLocator;
use webshell::script::JsEngine;
use webshell::ui::{ConsoleFrontend, UiLoop, UiSink};
use webshell::watch;

#[derive(Parser)]
#[command(name = "webshell", version, about = "Run a web page backed by script workers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the shell (default)
    Run,
    /// Write a self-contained copy of the shell with the local web folder bundled in
    Package {
        /// Path of the packaged executable to write
        target: PathBuf,
    },
    /// Extract the bundled web folder into the local web folder
    Unpackage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ShellConfig::from_env()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Package { target } => {
            let launcher = std::env::current_exe()?;
            let bundle = config.bundle_path();
            let report =
                package::package(&config.web_dir, &launcher, bundle.as_deref(), &target)?;
            eprintln!(
                "📦 Packaged {} ({} files added, {} removed)",
                target.display(),
                report.added.len(),
                report.removed.len()
            );
            Ok(())
        }
        Command::Unpackage => {
            let bundle = config.bundle_path();
            let created = package::unpackage(bundle.as_deref(), &config.web_dir)?;
            for path in &created {
                eprintln!("   Created {}", path.display());
            }
            Ok(())
        }
    }
}

async fn run(config: ShellConfig) -> anyhow::Result<()> {
    let locator = ResourceLocator::detect(&config)?;
    let engine = Arc::new(JsEngine::new());
    let (ui, events) = UiSink::channel();

    eprintln!("🧭 webshell v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Workers: {}", config.worker_count);

    let controller = Lifecycle::start(&config, locator.clone(), engine, ui).await?;

    let dev_watch = match &locator {
        ResourceLocator::Dev { root } => {
            eprintln!("   In dev mode. Watching {}", root.display());
            Some(watch::spawn_reload_task(
                Arc::clone(&controller),
                root,
                config.reload_debounce,
            )?)
        }
        ResourceLocator::Bundled { archive } => {
            eprintln!("   Not in dev mode. Serving {}", archive.display());
            None
        }
    };
    eprintln!("   Type `<function> <args...>` and press Enter. /quit to exit.\n");

    let result = UiLoop::new(ConsoleFrontend::new(), events, Arc::clone(&controller))
        .run()
        .await;

    if let Some(dev_watch) = dev_watch {
        dev_watch.abort();
    }
    controller.shutdown().await;
    result?;
    Ok(())
}
