use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use test_splitter::api::{ApiClient, ClientConfig, RetryPolicy};
use test_splitter::app::{self, report, EXIT_INFRASTRUCTURE};
use test_splitter::config::{Config, RunArgs};
use test_splitter::runner::{detect_runner, install_signal_handler};
use test_splitter::VERSION;

fn init_tracing(debug: bool) {
    let default = if debug {
        "test_splitter=debug"
    } else {
        "test_splitter=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match RunArgs::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return exit_code(EXIT_INFRASTRUCTURE);
        }
    };

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            report(format!("Invalid configuration: {err}"));
            return exit_code(EXIT_INFRASTRUCTURE);
        }
    };

    init_tracing(config.debug);

    if let Err(err) = install_signal_handler() {
        report(format!("Couldn't install signal handler: {err}"));
        return exit_code(EXIT_INFRASTRUCTURE);
    }

    let client = match ApiClient::new(ClientConfig {
        server_base_url: config.server_base_url.clone(),
        access_token: config.access_token.clone(),
        organization_slug: config.organization_slug.clone(),
        version: VERSION.to_string(),
        retry_policy: RetryPolicy::new().with_deadline(config.api_deadline),
    }) {
        Ok(client) => client,
        Err(err) => {
            report(format!("Couldn't create API client: {err}"));
            return exit_code(EXIT_INFRASTRUCTURE);
        }
    };

    let runner = detect_runner(config.test_runner, config.runner_config());

    exit_code(app::run(&config, &client, runner.as_ref()).await)
}

/// Process exit statuses are truncated to 8 bits.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
