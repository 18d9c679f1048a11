use clap::Parser;
use textgen::{affinity, cli::TrainArgs, commands, CharRnn, Config, CONFIG_FILE, RESERVED_THREADS};

fn main() -> anyhow::Result<()> {
    // Default to info logging if nothing is set.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    // Initialize stuff
    pretty_env_logger::init();
    let args = TrainArgs::parse();
    let config = Config::load_or_default(CONFIG_FILE)?;

    // Leave some headroom for whatever else runs on this host.
    affinity::reserve_threads(RESERVED_THREADS)?;

    let report = commands::train::<CharRnn>(&args, &config)?;
    if let Some(loss) = report.train_losses.last() {
        log::info!("finished {} epoch(s), final train loss = {loss:0.3}", report.epochs());
    }

    Ok(())
}
