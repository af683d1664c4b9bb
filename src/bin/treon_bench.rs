use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use treon_perf_bench::candidate::{ExecutableCandidate, ReferenceCandidate, DEFAULT_TIMEOUT};
use treon_perf_bench::payload;
use treon_perf_bench::report::{render_notes, Report};
use treon_perf_bench::schema::{BenchReport, RunMeta, SCHEMA_VERSION};
use treon_perf_bench::suite::{BenchmarkSuite, SuiteConfig, DEFAULT_SEARCH_NEEDLE};
use treon_perf_bench::SuiteProfile;

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate payloads and run every candidate against each size.
    Run {
        /// Payload size in MB. Repeat to run several; overrides the profile's sizes.
        #[arg(long = "size", value_name = "MB")]
        sizes: Vec<u32>,

        /// External candidate as NAME=PATH. Replaces the profile's default executables.
        #[arg(long = "exe", value_name = "NAME=PATH", value_parser = parse_executable)]
        executables: Vec<(String, PathBuf)>,

        /// Skip the in-process reference candidate.
        #[arg(long, default_value_t = false)]
        no_reference: bool,

        /// Wall-clock budget per external executable run.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,

        /// Substring searched for in user names after each size.
        #[arg(long, default_value = DEFAULT_SEARCH_NEEDLE)]
        search: String,

        /// Skip the name-search probe.
        #[arg(long, default_value_t = false)]
        no_search: bool,

        /// Also write a markdown summary here.
        #[arg(long, value_name = "FILE")]
        markdown: Option<PathBuf>,
    },

    /// Write a synthetic payload to disk.
    Generate {
        /// Target size in MB.
        #[arg(long, short = 's', default_value_t = 1)]
        size_mb: u32,

        /// Output file.
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "treon-bench")]
#[command(about = "Cross-implementation JSON processing benchmark (single-shot timings)")]
struct Args {
    #[arg(long, value_enum, default_value_t = SuiteProfile::Full, global = true)]
    profile: SuiteProfile,

    /// Where to write the JSON report. If omitted, only the table is printed.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

fn parse_executable(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got {s:?}")),
    }
}

fn now_utc_unix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> io::Result<()> {
    init_tracing();
    let args = Args::parse();

    match args.cmd {
        Command::Run {
            sizes,
            executables,
            no_reference,
            timeout_secs,
            search,
            no_search,
            markdown,
        } => {
            let mut config = SuiteConfig::for_profile(args.profile);
            if !sizes.is_empty() {
                config.sizes = sizes;
            }
            config.search_needle = (!no_search).then_some(search);

            let mut suite = BenchmarkSuite::new(config);
            if !no_reference {
                suite
                    .add_candidate(Box::new(ReferenceCandidate::default()))
                    .map_err(io::Error::other)?;
            }

            let executables = if executables.is_empty() {
                args.profile
                    .default_executables()
                    .iter()
                    .map(|&(name, path)| (name.to_string(), PathBuf::from(path)))
                    .collect()
            } else {
                executables
            };
            let timeout = Duration::from_secs(timeout_secs);
            for (name, path) in executables {
                suite
                    .add_candidate(Box::new(
                        ExecutableCandidate::new(name, path).with_timeout(timeout),
                    ))
                    .map_err(io::Error::other)?;
            }

            info!(
                profile = args.profile.as_str(),
                sizes = ?suite.config().sizes,
                candidates = ?suite.candidate_names(),
                "starting benchmark suite"
            );
            let records = suite.run().map_err(io::Error::other)?;

            let report = Report::from_records(&records);
            println!("{}", report.render_table());
            println!("{}", render_notes());

            if let Some(path) = markdown {
                fs::write(path, report.render_markdown())?;
            }

            if let Some(out) = args.out {
                let full = BenchReport::new(
                    RunMeta {
                        schema_version: SCHEMA_VERSION,
                        bench_version: env!("CARGO_PKG_VERSION").to_string(),
                        profile: args.profile.as_str().to_string(),
                        timestamp_utc: now_utc_unix(),
                        git_sha: git_sha_short(),
                        sizes_mb: suite.config().sizes.clone(),
                        candidates: suite.candidate_names(),
                    },
                    records,
                );
                let json = serde_json::to_string_pretty(&full).map_err(io::Error::other)?;
                fs::write(out, json)?;
            }
        }
        Command::Generate { size_mb, output } => {
            let start = Instant::now();
            let generated = payload::generate(size_mb).map_err(io::Error::other)?;
            fs::write(&output, &generated.text)?;
            let elapsed = start.elapsed();

            info!(
                path = %output.display(),
                users = generated.user_count(),
                canonical_bytes = generated.canonical_len,
                file_bytes = generated.text.len(),
                seconds = elapsed.as_secs_f64(),
                "payload written"
            );
        }
    }

    Ok(())
}
