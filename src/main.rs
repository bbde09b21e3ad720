use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use taskserver::broker::Options;
use taskserver::client::{read_samples, run_client, verify, write_samples, Summary};
use taskserver::{logger, Kernel, Server, ServerOpts};

/// Runs one client per kernel against a single task server, then checks
/// every recorded result.
#[derive(Debug, Parser)]
#[command(name = "taskserver", version)]
struct Args {
    /// Tasks each client submits
    #[arg(long, default_value_t = 1000)]
    works: usize,

    /// Directory for sin.txt, sqrt.txt, pow.txt and summary.json
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// RNG seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Largest accepted |result - expected|
    #[arg(long, default_value_t = 1.0)]
    tolerance: f64,

    /// How long the worker blocks on an empty queue, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    logger::init(&args.log_level);

    let server: Arc<Server<f64>> = Arc::new(Server::new(ServerOpts::in_memory(Options {
        poll_period: Duration::from_millis(args.poll_ms),
    }))?);

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, works = args.works, "starting clients");

    let mut clients = JoinSet::new();
    for (i, kernel) in Kernel::ALL.into_iter().enumerate() {
        let server = server.clone();
        let works = args.works;
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
        clients.spawn_blocking(move || {
            run_client(&server, kernel, works, &mut rng).map(|samples| (kernel, samples))
        });
    }

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interrupted = false;
    let mut finished = Vec::new();

    while !clients.is_empty() {
        tokio::select! {
            _ = &mut shutdown, if !interrupted => {
                warn!("interrupted, stopping server");
                interrupted = true;
                let server = server.clone();
                tokio::task::spawn_blocking(move || server.stop()).await?;
            }
            Some(joined) = clients.join_next() => match joined? {
                Ok(done) => finished.push(done),
                Err(e) => error!(error = %e, "client failed"),
            },
        }
    }

    {
        let server = server.clone();
        tokio::task::spawn_blocking(move || server.stop()).await?;
    }
    println!("End");

    std::fs::create_dir_all(&args.out_dir)?;
    finished.sort_by_key(|(kernel, _)| Kernel::ALL.iter().position(|k| k == kernel));

    let mut reports = Vec::with_capacity(finished.len());
    for (kernel, samples) in &finished {
        let path = args.out_dir.join(kernel.file_name());
        write_samples(&path, samples)?;

        let report = verify(*kernel, &read_samples(&path)?, args.tolerance);
        if report.passed {
            println!("{}: Test passed successfully!", kernel);
        } else {
            println!("{}: Test failed: {:?}", kernel, report.first_mismatch);
        }
        reports.push(report);
    }

    let summary = Summary {
        issued: server.last_id(),
        reports,
    };
    summary.write(&args.out_dir.join("summary.json"))?;

    if interrupted || finished.len() != Kernel::ALL.len() {
        return Err("not every client finished".into());
    }
    if !summary.passed() {
        return Err("verification failed".into());
    }
    Ok(())
}
