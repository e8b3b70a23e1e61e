use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use memwidget::render::Layout;
use memwidget::{Config, Widget};

#[derive(Debug, Parser)]
#[command(name = "memwidget", version, about = "Memory usage dashboard widget")]
struct Cli {
    /// Detailed layout with graphs, tables and a 30 sample history
    #[arg(long)]
    extended: bool,

    /// Config file (default: <config dir>/memwidget/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for the rolling history files
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Delete the history files and exit
    #[arg(long)]
    clear_history: bool,

    /// Print the sampled data as JSON instead of widget output
    #[arg(long)]
    json: bool,

    /// Print the default config and exit
    #[arg(long)]
    default_config: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("memwidget={level}")));

    // stdout carries the widget protocol
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.default_config {
        print!("{}", Config::generate_default_toml());
        return;
    }

    let cfg = Config::load(cli.config.as_deref());
    let history_dir = cli.cache_dir.clone().unwrap_or_else(|| cfg.history_dir());
    let widget = Widget::new(&cfg, history_dir);
    let layout = Layout::from_extended(cli.extended);

    if cli.clear_history {
        if let Err(e) = widget.history().clear() {
            tracing::warn!("{e}");
        }
        return;
    }

    if cli.json {
        match serde_json::to_string_pretty(&widget.sample(Layout::Extended)) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!("failed to encode sample: {e}"),
        }
        return;
    }

    let stdout = std::io::stdout();
    if let Err(e) = widget.run(layout, &mut stdout.lock()) {
        tracing::debug!("stdout closed: {e}");
    }
}
