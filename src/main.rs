use std::process::ExitCode;

use ifmirrord::config::Config;
use ifmirrord::daemon::Daemon;
use ifmirrord::error::DaemonError;
use log::info;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stdout)
        .parse_default_env()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run() -> Result<(), DaemonError> {
    let config = Config::parse_args(std::env::args())?;

    let mut daemon = Daemon::new(config.clone()).map_err(DaemonError::Netlink)?;

    info!("reconciling kernel state against the daemon-owned table range");
    let stats = daemon.reconcile().map_err(DaemonError::Netlink)?;
    info!(
        "reconcile: {} rules flushed, {} routes flushed, {} routes replicated, {} rules created",
        stats.rules_flushed, stats.routes_flushed, stats.routes_replicated, stats.rules_created
    );

    if config.dump {
        println!(
            "rules_seen={} routes_seen={} addrs_seen={}",
            stats.rules_seen, stats.routes_seen, stats.addrs_seen
        );
    }

    daemon.run().map_err(DaemonError::Netlink)
}
