use netlink_packet_route::{AF_INET, AF_INET6, AF_UNSPEC};

pub type Family = u8;

pub const FAMILY_ALL: u8 = AF_UNSPEC as u8;
pub const FAMILY_V4: u8 = AF_INET as u8;
pub const FAMILY_V6: u8 = AF_INET6 as u8;

/// RTAX_* metric identifiers, as carried inside a route's nested RTA_METRICS
/// attribute (linux/rtnetlink.h). Only the subset reachable via
/// `--set-route-metric` is named here; any other id is still usable raw.
pub const RTAX_MTU: u8 = 2;
pub const RTAX_WINDOW: u8 = 3;
pub const RTAX_RTT: u8 = 4;
pub const RTAX_RTTVAR: u8 = 5;
pub const RTAX_SSTHRESH: u8 = 6;
pub const RTAX_CWND: u8 = 7;
pub const RTAX_ADVMSS: u8 = 8;
pub const RTAX_REORDERING: u8 = 9;
pub const RTAX_HOPLIMIT: u8 = 10;
pub const RTAX_INITCWND: u8 = 11;
pub const RTAX_FEATURES: u8 = 12;
pub const RTAX_RTO_MIN: u8 = 13;
pub const RTAX_INITRWND: u8 = 14;
pub const RTAX_QUICKACK: u8 = 15;

/// Resolve a human-readable metric name (as accepted by `--set-route-metric`)
/// to its kernel RTAX_* id. Mirrors `rtnl_route_str2metric` from libnl.
pub fn metric_key_for(name: &str) -> Option<u8> {
    let key = match name {
        "mtu" => RTAX_MTU,
        "window" => RTAX_WINDOW,
        "rtt" => RTAX_RTT,
        "rttvar" => RTAX_RTTVAR,
        "ssthresh" => RTAX_SSTHRESH,
        "cwnd" => RTAX_CWND,
        "advmss" => RTAX_ADVMSS,
        "reordering" => RTAX_REORDERING,
        "hoplimit" => RTAX_HOPLIMIT,
        "initcwnd" => RTAX_INITCWND,
        "features" => RTAX_FEATURES,
        "rto_min" => RTAX_RTO_MIN,
        "initrwnd" => RTAX_INITRWND,
        "quickack" => RTAX_QUICKACK,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_metric_names() {
        assert_eq!(metric_key_for("mtu"), Some(RTAX_MTU));
        assert_eq!(metric_key_for("advmss"), Some(RTAX_ADVMSS));
    }

    #[test]
    fn rejects_unknown_metric_names() {
        assert_eq!(metric_key_for("bogus"), None);
    }
}
