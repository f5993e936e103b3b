use std::process::ExitCode;

use reel::{App, Config, Error, Router, Server, Service, health, movies, signal, telemetry};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet.
            eprintln!("{}", Error::from(e));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_logging(&config.log) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!(startup = e.is_startup(), "fatal: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            warn!("{e}");
            ExitCode::SUCCESS
        }
    }
}

async fn run(config: Config) -> Result<(), Error> {
    info!(environment = %config.environment, "starting");

    let app = App::new(config.clone())?;
    let router = movies::routes(health::routes(Router::new()));
    let service = Service::new(app, router);

    let trigger = signal::listen()?;
    Server::bind(config.listen_addr())
        .await?
        .grace_period(config.shutdown_timeout)
        .serve(service, trigger)
        .await
}
