use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PALAVER_LOG";

fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = palaver::cli::main() {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
