//! Route mutation and enumeration. Builds and sends `RtnlMessage::{New,Del}Route`
//! requests as a `RouteMessage` header plus a flat `Nla` list, dispatched
//! through a fresh [`NetlinkHandle`] per call.

use std::net::{IpAddr, Ipv4Addr};

use anyhow::anyhow;
use ipnetwork::IpNetwork;
use netlink_packet_core::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REPLACE, NLM_F_REQUEST,
};
use netlink_packet_route::route::Nla;
use netlink_packet_route::{
    RouteMessage, RtnlMessage, RTN_UNICAST, RTPROT_BOOT, RT_SCOPE_UNIVERSE, RT_TABLE_MAIN,
    RT_TABLE_UNSPEC,
};

use crate::handle::NetlinkHandle;
use crate::model::{NextHop, Route};
use crate::nl_type::Family;
use crate::utils::{self, bytes_to_ip};

fn new_route_msg() -> RouteMessage {
    let mut msg = RouteMessage::default();
    msg.header.table = RT_TABLE_MAIN;
    msg.header.scope = RT_SCOPE_UNIVERSE;
    msg.header.protocol = RTPROT_BOOT;
    msg.header.kind = RTN_UNICAST;
    msg
}

fn set_table(msg: &mut RouteMessage, table: u32) {
    if table > u8::MAX as u32 {
        msg.header.table = RT_TABLE_UNSPEC;
        msg.nlas.push(Nla::Table(table));
    } else {
        msg.header.table = table as u8;
    }
}

fn encode_metrics(metrics: &std::collections::BTreeMap<u8, u32>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(metrics.len() * 8);
    for (&key, &value) in metrics {
        let value_bytes = value.to_ne_bytes();
        let len: u16 = 8;
        buf.extend_from_slice(&len.to_ne_bytes());
        buf.extend_from_slice(&(key as u16).to_ne_bytes());
        buf.extend_from_slice(&value_bytes);
    }
    buf
}

fn build_message(route: &Route, protocol_override: Option<u8>) -> anyhow::Result<RouteMessage> {
    let dst = route
        .dst
        .ok_or_else(|| anyhow!("route has no destination prefix"))?;

    let mut msg = new_route_msg();
    msg.header.address_family = route.family;
    msg.header.destination_prefix_length = dst.prefix();
    msg.header.protocol = protocol_override.unwrap_or(route.protocol);
    msg.nlas.push(Nla::Destination(utils::ip_to_bytes(&dst.ip())));

    set_table(&mut msg, route.table);

    if let Some(hop) = route.next_hops.first() {
        msg.nlas.push(Nla::Oif(hop.ifindex));
        if let Some(gw) = hop.gateway {
            msg.nlas.push(Nla::Gateway(utils::ip_to_bytes(&gw)));
        }
    }

    if !route.metrics.is_empty() {
        msg.nlas.push(Nla::Metrics(encode_metrics(&route.metrics)));
    }

    Ok(msg)
}

pub fn route_add(route: &Route) -> anyhow::Result<()> {
    let flags = NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK;
    let msg = build_message(route, None)?;
    NetlinkHandle::new()?.execute(RtnlMessage::NewRoute(msg), flags)?;
    Ok(())
}

pub fn route_replace(route: &Route) -> anyhow::Result<()> {
    let flags = NLM_F_CREATE | NLM_F_REPLACE | NLM_F_ACK;
    let msg = build_message(route, None)?;
    NetlinkHandle::new()?.execute(RtnlMessage::NewRoute(msg), flags)?;
    Ok(())
}

pub fn route_delete(route: &Route, exclusive: bool) -> anyhow::Result<()> {
    let flags = if exclusive { NLM_F_EXCL | NLM_F_ACK } else { NLM_F_ACK };
    let msg = build_message(route, None)?;
    NetlinkHandle::new()?.execute(RtnlMessage::DelRoute(msg), flags)?;
    Ok(())
}

/// Dump every route visible to the kernel, across all tables and families.
/// The Reconciler and the Netlink Client's cache warm-up both use this.
pub fn route_list_all() -> anyhow::Result<Vec<Route>> {
    let mut msg = new_route_msg();
    msg.header.address_family = crate::nl_type::FAMILY_ALL;
    msg.header.destination_prefix_length = 0;
    msg.header.source_prefix_length = 0;
    msg.header.kind = 0;
    msg.header.table = RT_TABLE_UNSPEC;
    msg.header.protocol = 0;

    let replies = NetlinkHandle::new()?.execute(
        RtnlMessage::GetRoute(msg),
        NLM_F_REQUEST | NLM_F_DUMP,
    )?;

    let mut routes = Vec::new();
    for reply in replies {
        if let Some(route) = msg_to_route(reply)? {
            routes.push(route);
        }
    }
    Ok(routes)
}

pub(crate) fn msg_to_route(msg: RtnlMessage) -> anyhow::Result<Option<Route>> {
    let msg = match msg {
        RtnlMessage::NewRoute(inner) => inner,
        _ => return Ok(None),
    };
    route_from_message(msg).map(Some)
}

/// Parse a single `RouteMessage`, as delivered over either the request/reply
/// socket (via [`msg_to_route`]) or the subscription socket.
pub(crate) fn route_from_message(msg: RouteMessage) -> anyhow::Result<Route> {
    let family = msg.header.address_family as Family;
    let mut route = Route {
        family,
        protocol: msg.header.protocol,
        table: msg.header.table as u32,
        dst: None,
        next_hops: Vec::new(),
        metrics: Default::default(),
    };

    let mut ifindex = None;
    let mut gateway = None;
    for nla in msg.nlas {
        match nla {
            Nla::Table(table) => route.table = table,
            Nla::Oif(oif) => ifindex = Some(oif),
            Nla::Gateway(gw) => gateway = Some(bytes_to_ip(&gw, family)?),
            Nla::Destination(dst) => {
                let ip = bytes_to_ip(&dst, family)?;
                route.dst = Some(IpNetwork::new(ip, msg.header.destination_prefix_length)?);
            }
            _ => {}
        }
    }

    if let Some(ifindex) = ifindex {
        route.next_hops.push(NextHop { ifindex, gateway });
    }

    if route.dst.is_none() {
        route.dst = Some(IpNetwork::new(
            match family {
                crate::nl_type::FAMILY_V6 => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
                _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            },
            msg.header.destination_prefix_length,
        )?);
    }

    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_route() -> Route {
        Route {
            family: crate::nl_type::FAMILY_V4,
            table: 1003,
            protocol: crate::model::ROUTE_PROTOCOL_KERNEL,
            dst: Some("10.0.0.0/24".parse().unwrap()),
            next_hops: vec![NextHop {
                ifindex: 3,
                gateway: None,
            }],
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn build_message_sets_table_and_destination() {
        let route = sample_route();
        let msg = build_message(&route, None).unwrap();
        assert_eq!(msg.header.table, RT_TABLE_UNSPEC);
        assert!(msg.nlas.iter().any(|n| matches!(n, Nla::Table(1003))));
        assert_eq!(msg.header.destination_prefix_length, 24);
    }

    #[test]
    fn set_table_overflows_into_nla_above_255() {
        let mut msg = new_route_msg();
        set_table(&mut msg, 1003);
        assert_eq!(msg.header.table, RT_TABLE_UNSPEC);
        assert!(msg.nlas.iter().any(|n| matches!(n, Nla::Table(1003))));
    }

    #[test]
    fn set_table_keeps_small_tables_in_header() {
        let mut msg = new_route_msg();
        set_table(&mut msg, 254);
        assert_eq!(msg.header.table, 254);
        assert!(msg.nlas.is_empty());
    }

    #[test]
    fn encode_metrics_round_trips_length_type_value() {
        let mut metrics = BTreeMap::new();
        metrics.insert(crate::nl_type::RTAX_MTU, 1400u32);
        let buf = encode_metrics(&metrics);
        assert_eq!(buf.len(), 8);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 8);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), crate::nl_type::RTAX_MTU as u16);
        assert_eq!(u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]), 1400);
    }
}
