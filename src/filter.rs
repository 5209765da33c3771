//! Pure, side-effect-free scope predicates. Nothing here touches a socket;
//! everything is a function of the object's own fields.

use std::net::IpAddr;

use netlink_packet_route::RT_TABLE_MAIN;

use crate::model::{Addr, Route};
use crate::nl_type::{FAMILY_V4, FAMILY_V6};

/// A route is mirrored only if it sits in the main table, has exactly one
/// next hop on a real interface, and isn't an IPv6 link-local destination.
pub fn route_in_scope(route: &Route) -> bool {
    route.table == RT_TABLE_MAIN as u32
        && route
            .sole_ifindex()
            .map_or(false, |ifindex| ifindex > 1)
        && !is_ipv6_link_local(route)
}

fn is_ipv6_link_local(route: &Route) -> bool {
    if route.family != FAMILY_V6 {
        return false;
    }
    match route.dst.map(|d| d.ip()) {
        Some(IpAddr::V6(ip)) => ip.octets()[0] == 0xFE,
        _ => false,
    }
}

/// An address grows a source rule only if it's globally scoped, on a real
/// interface, and IPv4 or IPv6 (the only families the daemon understands).
pub fn addr_in_scope(addr: &Addr) -> bool {
    addr.scope == 0
        && addr.ifindex > 1
        && matches!(addr.family, FAMILY_V4 | FAMILY_V6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Addr, NextHop, Route};
    use crate::nl_type::FAMILY_V4;
    use ipnetwork::IpNetwork;

    fn in_scope_route() -> Route {
        Route {
            family: FAMILY_V4,
            table: RT_TABLE_MAIN as u32,
            protocol: crate::model::ROUTE_PROTOCOL_KERNEL,
            dst: Some("10.0.0.0/24".parse().unwrap()),
            next_hops: vec![NextHop {
                ifindex: 3,
                gateway: None,
            }],
            metrics: Default::default(),
        }
    }

    #[test]
    fn accepts_single_hop_main_table_route() {
        assert!(route_in_scope(&in_scope_route()));
    }

    #[test]
    fn rejects_non_main_table() {
        let mut r = in_scope_route();
        r.table = 254;
        assert!(!route_in_scope(&r));
    }

    #[test]
    fn rejects_multipath_routes() {
        let mut r = in_scope_route();
        r.next_hops.push(NextHop {
            ifindex: 4,
            gateway: None,
        });
        assert!(!route_in_scope(&r));
    }

    #[test]
    fn rejects_loopback_ifindex() {
        let mut r = in_scope_route();
        r.next_hops[0].ifindex = 1;
        assert!(!route_in_scope(&r));
    }

    #[test]
    fn rejects_ipv6_link_local_destination() {
        let mut r = in_scope_route();
        r.family = FAMILY_V6;
        r.dst = Some("fe80::/64".parse().unwrap());
        assert!(!route_in_scope(&r));
    }

    #[test]
    fn accepts_ipv6_global_destination() {
        let mut r = in_scope_route();
        r.family = FAMILY_V6;
        r.dst = Some("2001:db8::/64".parse().unwrap());
        assert!(route_in_scope(&r));
    }

    fn in_scope_addr() -> Addr {
        Addr {
            ifindex: 3,
            family: FAMILY_V4,
            scope: 0,
            local: IpNetwork::new("10.0.0.5".parse().unwrap(), 24).unwrap(),
        }
    }

    #[test]
    fn accepts_global_scope_address() {
        assert!(addr_in_scope(&in_scope_addr()));
    }

    #[test]
    fn rejects_non_global_scope() {
        let mut a = in_scope_addr();
        a.scope = 253; // RT_SCOPE_LINK
        assert!(!addr_in_scope(&a));
    }

    #[test]
    fn rejects_loopback_interface() {
        let mut a = in_scope_addr();
        a.ifindex = 1;
        assert!(!addr_in_scope(&a));
    }
}
