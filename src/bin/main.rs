use std::process;

use azure_debug_info::credential::settings::EnvironmentSettings;
use azure_debug_info::http::client::HttpClient;
use azure_debug_info::http::config::HttpConfig;
use azure_debug_info::logging;
use azure_debug_info::parameters::{Opts, exit_code};
use azure_debug_info::session;
use azure_debug_info::signal::{SignalWaiter, TERMINATION_SIGNALS, signal_name};
use clap::{CommandFactory, Parser};
use tracing::{error, info};

const AUTHOR: &str = "webdevops.io";

fn main() {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(err) => {
            let code = exit_code(&err);
            if code == 0 {
                let _ = err.print();
            } else {
                println!("{err}");
                let _ = Opts::command().print_help();
            }
            process::exit(code);
        }
    };

    if let Err(err) = logging::init(&opts.logger) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Err(err) = run(&opts) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(opts: &Opts) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "starting azure-debug-info v{} ({}; by {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_COMMIT").unwrap_or("<unknown>"),
        AUTHOR
    );
    info!("{}", opts.to_json()?);

    info!("init Azure connection");
    let settings = EnvironmentSettings::from_env();
    let http_client = HttpClient::new(HttpConfig::default())?;
    let probe_client = HttpClient::new(HttpConfig::probe())?;

    let session = session::connect(
        &opts.azure.environment,
        &settings,
        http_client.clone(),
        &probe_client,
    )?;
    session.report(&settings, http_client, &probe_client)?;

    let waiter = SignalWaiter::register(&TERMINATION_SIGNALS)?;
    let signal = waiter.wait()?;

    println!();
    println!("{}", signal_name(signal));
    info!("received {}, shutting down", signal_name(signal));

    Ok(())
}
