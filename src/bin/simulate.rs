//! Random-play simulation driver.
//!
//! Loads a board and lets a handful of bot players hammer it concurrently:
//! each bot plays turns of two random flips with random think time, while a
//! watcher task counts change notifications. Useful for eyeballing the
//! board's behavior under contention.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::time::{sleep, timeout};

use memory_scramble::Board;

#[derive(Parser, Debug)]
#[command(author, version, about = "Random-play simulation for the game board")]
struct Args {
    /// Board file to play on
    #[arg(short, long, default_value = "boards/ab.txt")]
    board: PathBuf,

    /// Number of concurrent bot players
    #[arg(short, long, default_value_t = 1)]
    players: usize,

    /// Turns each bot attempts
    #[arg(short, long, default_value_t = 10)]
    tries: usize,

    /// Maximum think time between flips, in milliseconds
    #[arg(short, long, default_value_t = 100)]
    max_delay_ms: u64,
}

#[derive(Debug, Default)]
struct BotSummary {
    flips: u32,
    failures: u32,
    timeouts: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let board = Arc::new(Board::load(&args.board).await?);
    let (rows, cols) = board.dimensions();
    println!(
        "simulating {} player(s), {} turn(s) each, on a {}x{} board",
        args.players, args.tries, rows, cols
    );

    let changes = Arc::new(AtomicU64::new(0));
    let watcher = {
        let board = Arc::clone(&board);
        let changes = Arc::clone(&changes);
        tokio::spawn(async move {
            loop {
                board.watch().await;
                changes.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    let mut bots = Vec::new();
    for n in 0..args.players {
        let board = Arc::clone(&board);
        let max_delay = args.max_delay_ms;
        let tries = args.tries;
        bots.push(tokio::spawn(async move {
            let id = format!("bot{}", n);
            let mut summary = BotSummary::default();
            for _ in 0..tries {
                think(max_delay).await;
                if !attempt_flip(&board, &id, rows, cols, &mut summary).await {
                    // First pick failed; start the next turn fresh.
                    continue;
                }
                think(max_delay).await;
                attempt_flip(&board, &id, rows, cols, &mut summary).await;
            }
            (id, summary)
        }));
    }

    for bot in bots {
        let (id, summary) = bot.await?;
        println!(
            "{}: {} flips, {} rule failures, {} timeouts",
            id, summary.flips, summary.failures, summary.timeouts
        );
    }

    watcher.abort();
    println!("observed {} board changes", changes.load(Ordering::Relaxed));
    Ok(())
}

/// Attempts one flip at a random position; true if it landed.
async fn attempt_flip(
    board: &Board,
    id: &str,
    rows: usize,
    cols: usize,
    summary: &mut BotSummary,
) -> bool {
    let (row, col) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(0..rows), rng.gen_range(0..cols))
    };
    match timeout(Duration::from_secs(5), board.flip(id, row, col)).await {
        Ok(Ok(())) => {
            summary.flips += 1;
            true
        }
        Ok(Err(_)) => {
            summary.failures += 1;
            false
        }
        // Waited too long behind another bot; the flip is cancelled and the
        // bot moves on.
        Err(_) => {
            summary.timeouts += 1;
            false
        }
    }
}

async fn think(max_delay_ms: u64) {
    let delay = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0..=max_delay_ms)
    };
    sleep(Duration::from_millis(delay)).await;
}
