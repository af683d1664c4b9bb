//! The reference transformation behind the external invocation contract,
//! so it can be benchmarked as a subprocess alongside other backends.

use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use treon_perf_bench::transform::process_json_data;

#[derive(Parser, Debug)]
#[command(name = "treon-reference")]
#[command(about = "Process a JSON payload with the reference transformation")]
struct Args {
    /// Payload file to process.
    #[arg(long, value_name = "FILE")]
    benchmark: PathBuf,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let text = fs::read_to_string(&args.benchmark)?;
    let data: serde_json::Value = serde_json::from_str(&text).map_err(io::Error::other)?;
    let processed = process_json_data(&data);

    let summary = serde_json::to_string(&processed.summary).map_err(io::Error::other)?;
    println!("{summary}");
    Ok(())
}
