use clap::Parser;
use client::identity_store::IdentityStore;
use client::network::Client;
use log::{info, warn};
use rand::Rng;
use shared::{COLS, ROWS};
use std::path::PathBuf;
use tokio::time::{interval, Duration};

/// Claims between progress log lines
const PROGRESS_EVERY: u64 = 10;

/// Headless participant that claims random cells
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, env = "GRID_SERVER_URL", default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// File used to remember the confirmed identity between runs
    #[arg(short = 'i', long)]
    identity_file: Option<PathBuf>,

    /// Delay between claims in milliseconds
    #[arg(long, default_value = "500")]
    interval_ms: u64,

    /// Number of claims before exiting (0 = run until disconnected)
    #[arg(short = 'n', long, default_value = "0")]
    claims: u64,

    /// Number of grid rows
    #[arg(long, default_value_t = ROWS)]
    rows: usize,

    /// Number of grid columns
    #[arg(long, default_value_t = COLS)]
    cols: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let store = args.identity_file.map(IdentityStore::new);
    let mut client = Client::connect(&args.server, args.rows, args.cols, store).await?;

    let mut claim_interval = interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut sent = 0u64;

    loop {
        tokio::select! {
            message = client.next_message() => {
                if message?.is_none() {
                    break;
                }
            },

            _ = claim_interval.tick() => {
                if args.claims > 0 && sent >= args.claims {
                    break;
                }
                if !client.grid().identity().confirmed {
                    continue;
                }

                let (row, col) = {
                    let grid = client.grid();
                    let mut rng = rand::thread_rng();
                    (rng.gen_range(0..grid.rows()), rng.gen_range(0..grid.cols()))
                };
                if !client.capture(row, col).await? {
                    continue;
                }
                sent += 1;

                if progress_due(sent) {
                    let grid = client.grid();
                    info!(
                        "Sent {} claims; holding {} of {} claimed cells",
                        sent,
                        grid.owned_by_me(),
                        grid.claimed_count()
                    );
                }
            },
        }
    }

    let grid = client.grid();
    let mut scores: Vec<(String, usize)> = grid.scores().into_iter().collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (owner, cells) in scores.iter().take(5) {
        info!("{}: {} cells", owner, cells);
    }

    if client.is_connected() {
        if let Err(e) = client.close().await {
            warn!("Error while closing connection: {}", e);
        }
    }

    Ok(())
}

fn progress_due(sent: u64) -> bool {
    sent > 0 && sent % PROGRESS_EVERY == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_not_logged_before_first_claim() {
        assert!(!progress_due(0));
        assert!(!progress_due(1));
        assert!(progress_due(PROGRESS_EVERY));
        assert!(!progress_due(PROGRESS_EVERY + 1));
        assert!(progress_due(PROGRESS_EVERY * 3));
    }
}
