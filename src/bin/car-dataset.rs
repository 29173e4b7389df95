//! Car dataset CLI tool
//!
//! Downloads, splits and auto-annotates car images for object detection training.

#[cfg(feature = "cli")]
use car_dataset::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
