use std::sync::Arc;

use log::info;

use memory_scramble::{Board, Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Note: set RUST_LOG=info to see server logs");
    }

    let config = Config::load();
    info!("loading board from {}", config.board_file.display());
    let board = Arc::new(Board::load(&config.board_file).await?);
    let (rows, cols) = board.dimensions();
    info!("board loaded: {}x{}", rows, cols);

    let server = Server::bind(&config.host, config.port, board).await?;
    server.run().await?;
    Ok(())
}
