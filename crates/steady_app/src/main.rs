use steady_app::app::{run, AppConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid Steady configuration: {err:#}");
            std::process::exit(2);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter()))
        .init();
    if let Err(err) = run(config) {
        tracing::error!(error = %format!("{err:#}"), "Steady terminated");
        std::process::exit(1);
    }
}
