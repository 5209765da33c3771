//! Pure functions deriving the replica route / source rule the Mutator will
//! try to install. No netlink I/O happens here.

use ipnetwork::IpNetwork;

use crate::config::Config;
use crate::model::{daemon_table_for, Addr, Route, Rule, FR_ACT_TO_TBL};
use crate::nl_type::FAMILY_V6;

/// Clone `route` into its per-interface replica: apply the configured
/// metric overrides and retable it to `1000 + ifindex`. Panics if `route`
/// has more than one next hop — callers must have already run it through
/// [`crate::filter::route_in_scope`].
pub fn route_to_replica(route: &Route, config: &Config) -> Route {
    let ifindex = route
        .sole_ifindex()
        .expect("route_to_replica requires a single-next-hop route");

    let mut replica = route.clone();
    for &(metric_key, value) in &config.route_metrics {
        replica.metrics.insert(metric_key, value);
    }
    replica.table = daemon_table_for(ifindex);
    replica
}

/// Build the source rule for `addr`: host-prefix selector, action to-table,
/// table = `1000 + ifindex`.
pub fn addr_to_rule(addr: &Addr) -> anyhow::Result<Rule> {
    let host_prefix = if addr.family == FAMILY_V6 { 128 } else { 32 };
    let src = IpNetwork::new(addr.local.ip(), host_prefix)?;

    Ok(Rule {
        family: addr.family,
        src: Some(src),
        table: daemon_table_for(addr.ifindex),
        action: FR_ACT_TO_TBL,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Addr, NextHop};
    use crate::nl_type::FAMILY_V4;
    use std::collections::BTreeMap;

    fn sample_route() -> Route {
        Route {
            family: FAMILY_V4,
            table: netlink_packet_route::RT_TABLE_MAIN as u32,
            protocol: crate::model::ROUTE_PROTOCOL_KERNEL,
            dst: Some("192.168.1.0/24".parse().unwrap()),
            next_hops: vec![NextHop {
                ifindex: 7,
                gateway: Some("192.168.1.1".parse().unwrap()),
            }],
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn retables_to_daemon_owned_table() {
        let config = Config::default();
        let replica = route_to_replica(&sample_route(), &config);
        assert_eq!(replica.table, 1007);
        assert_eq!(replica.dst, sample_route().dst);
        assert_eq!(replica.next_hops, sample_route().next_hops);
    }

    #[test]
    fn applies_configured_metric_overrides() {
        let config = Config {
            route_metrics: vec![(crate::nl_type::RTAX_MTU, 1400)],
            dump: false,
        };
        let replica = route_to_replica(&sample_route(), &config);
        assert_eq!(replica.metrics.get(&crate::nl_type::RTAX_MTU), Some(&1400));
    }

    #[test]
    fn builds_host_prefix_rule_for_ipv4_address() {
        let addr = Addr {
            ifindex: 3,
            family: FAMILY_V4,
            scope: 0,
            local: IpNetwork::new("10.0.0.5".parse().unwrap(), 24).unwrap(),
        };
        let rule = addr_to_rule(&addr).unwrap();
        assert_eq!(rule.table, 1003);
        assert_eq!(rule.src.unwrap().prefix(), 32);
        assert_eq!(rule.src.unwrap().ip().to_string(), "10.0.0.5");
        assert!(rule.is_to_table());
    }

    #[test]
    fn builds_host_prefix_rule_for_ipv6_address() {
        let addr = Addr {
            ifindex: 5,
            family: FAMILY_V6,
            scope: 0,
            local: IpNetwork::new("2001:db8::1".parse().unwrap(), 64).unwrap(),
        };
        let rule = addr_to_rule(&addr).unwrap();
        assert_eq!(rule.table, 1005);
        assert_eq!(rule.src.unwrap().prefix(), 128);
    }
}
