use std::io::Write;

use clap::Parser;
use textgen::{cli::GenerateArgs, commands, CharRnn, Config, CONFIG_FILE};

fn main() -> anyhow::Result<()> {
    // Default to info logging if nothing is set.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init();
    let args = GenerateArgs::parse();
    let config = Config::load_or_default(CONFIG_FILE)?;

    // Lines are only printed once all of them were generated, a failure
    // part way through prints nothing.
    let lines = commands::generate::<CharRnn>(&args, &config)?;

    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;

    Ok(())
}
