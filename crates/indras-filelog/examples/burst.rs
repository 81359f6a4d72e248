//! Floods a logger from several threads to show rotation and compression.
//!
//! ```sh
//! cargo run -p indras-filelog --example burst -- ./logs
//! ```
//! Then look under `./logs/database/` for hourly buckets of 16KB files.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use indras_filelog::{Logger, LoggerConfig};

fn main() -> indras_filelog::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let root = std::env::args().nth(1).unwrap_or_else(|| "logs".to_string());
    let config = LoggerConfig::default()
        .with_level("debug")
        .with_frequency("hourly")
        .with_max_size("16kb")
        .with_console(true)
        .with_compress(true);

    let logger = Arc::new(Logger::new("example", "database", &root, config)?);

    let handles: Vec<_> = (0..4)
        .map(|producer| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for seq in 0..500 {
                    logger.debug(format!("producer {producer} debug {seq}"));
                    logger.info(format!("producer {producer} info {seq}"));
                    logger.warning(format!("producer {producer} warning {seq}"));
                    logger.jedi(format!("producer {producer} jedi {seq}"));
                    logger.error(format!("producer {producer} error {seq}"));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    logger.flush()?;
    if let Some(path) = logger.active_file() {
        println!("last file: {}", path.display());
    }
    Ok(())
}
