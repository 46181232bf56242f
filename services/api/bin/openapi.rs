//! Dumps the counter API's OpenAPI document.

use anyhow::Context;
use clap::Parser;
use duplex_api::router::write_openapi;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Write the OpenAPI document for the duplex API")]
struct Args {
    /// Where to write the JSON document.
    #[arg(short, long, default_value = "openapi.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    write_openapi(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
