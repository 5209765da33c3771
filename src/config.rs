//! Command-line configuration. Parsed once in `main` into an immutable
//! [`Config`] value and threaded through to the transformer; there is no
//! global or mutable state to read back out of.

use clap::Parser;

use crate::error::DaemonError;
use crate::nl_type::metric_key_for;

#[derive(Debug, Parser)]
#[command(
    name = "ifmirrord",
    about = "Mirrors the main routing table into per-interface tables selected by source-address policy rules"
)]
struct Cli {
    /// Adds the specified metric to every replicated route; can be repeated.
    /// Syntax: <name>=<value>, e.g. --set-route-metric mtu=1400
    #[arg(long = "set-route-metric")]
    set_route_metric: Vec<String>,

    /// Dump all observed attributes on startup.
    #[arg(long)]
    dump: bool,
}

/// Parsed, immutable configuration consumed by the transformer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Ordered (metric_key, value) overrides applied to every replicated route.
    pub route_metrics: Vec<(u8, u32)>,
    pub dump: bool,
}

impl Config {
    /// Parse `argv`, resolving metric names against the netlink client's
    /// metric table. Unknown options or malformed metrics are fatal.
    pub fn parse_args<I, T>(args: I) -> Result<Config, DaemonError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| DaemonError::Config(e.to_string()))?;

        let mut route_metrics = Vec::with_capacity(cli.set_route_metric.len());
        for spec in &cli.set_route_metric {
            route_metrics.push(parse_metric_spec(spec)?);
        }

        Ok(Config {
            route_metrics,
            dump: cli.dump,
        })
    }
}

fn parse_metric_spec(spec: &str) -> Result<(u8, u32), DaemonError> {
    let (name, value_str) = spec
        .split_once('=')
        .filter(|(n, v)| !n.is_empty() && !v.is_empty())
        .ok_or_else(|| {
            DaemonError::Config(format!(
                "Invalid syntax for --set-route-metric {spec}, expected <name>=<value>"
            ))
        })?;

    let key = metric_key_for(name)
        .ok_or_else(|| DaemonError::UnknownMetric(name.to_string()))?;
    let value: u32 = value_str
        .parse()
        .map_err(|_| DaemonError::Config(format!("Invalid metric value: {value_str}")))?;

    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_metric_overrides() {
        let cfg = Config::parse_args([
            "ifmirrord",
            "--set-route-metric",
            "mtu=1400",
            "--set-route-metric",
            "advmss=1380",
        ])
        .unwrap();
        assert_eq!(cfg.route_metrics, vec![(2, 1400), (8, 1380)]);
        assert!(!cfg.dump);
    }

    #[test]
    fn dump_flag_is_recognized() {
        let cfg = Config::parse_args(["ifmirrord", "--dump"]).unwrap();
        assert!(cfg.dump);
        assert!(cfg.route_metrics.is_empty());
    }

    #[test]
    fn rejects_malformed_metric_spec() {
        let err = Config::parse_args(["ifmirrord", "--set-route-metric", "mtu"]).unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }

    #[test]
    fn rejects_unknown_metric_name() {
        let err =
            Config::parse_args(["ifmirrord", "--set-route-metric", "bogus=1"]).unwrap_err();
        assert!(matches!(err, DaemonError::UnknownMetric(name) if name == "bogus"));
    }
}
