use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Swerve drivetrain runtime
#[derive(Parser)]
struct Args {
    /// Step a physics model for the hardware after each real update
    #[arg(long)]
    sim: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    if let Err(e) = swerve_runtime::runtime::run(args.sim).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
