//! The subscription half of the Netlink Client: a second, dedicated socket
//! bound to the routing multicast groups, plus the keyed caches used to
//! tell a NEW notification apart from a CHANGE one. The datagram framing
//! reuses [`crate::handle::NetlinkHandle`]'s own decode loop, generalized
//! to an unsolicited, unbounded read.

use std::collections::HashSet;

use anyhow::anyhow;
use bytes::BytesMut;
use log::{error, warn};
use netlink_packet_core::{NetlinkBuffer, NetlinkDeserializable, NetlinkMessage, NetlinkPayload};
use netlink_packet_route::RtnlMessage;
use netlink_sys::protocols::NETLINK_ROUTE;
use netlink_sys::SocketAddr;

use crate::model::{Action, Addr, Route};
use crate::{addr, route};

const READ_CAPACITY: usize = 64 * 1024;

// linux/rtnetlink.h multicast group bits. Not all present in every `libc`
// build, so named here directly rather than risking an absent constant.
const RTMGRP_IPV4_IFADDR: u32 = 0x10;
const RTMGRP_IPV4_ROUTE: u32 = 0x40;
const RTMGRP_IPV6_IFADDR: u32 = 0x100;
const RTMGRP_IPV6_ROUTE: u32 = 0x400;

const SUBSCRIBED_GROUPS: u32 =
    RTMGRP_IPV4_ROUTE | RTMGRP_IPV6_ROUTE | RTMGRP_IPV4_IFADDR | RTMGRP_IPV6_IFADDR;

/// Enough of a route or address's identity to diff successive NEW
/// notifications against: if the key was already present, the kernel is
/// reporting a change to an object we already know about.
type RouteKey = (u8, u32, Option<String>, Option<u32>);
type AddrKey = (u32, u8, String);

fn route_key(r: &Route) -> RouteKey {
    (
        r.family,
        r.table,
        r.dst.map(|d| d.to_string()),
        r.sole_ifindex(),
    )
}

fn addr_key(a: &Addr) -> AddrKey {
    (a.ifindex, a.family, a.local.to_string())
}

/// A dispatched subscription event.
pub enum Event {
    Route(Route, Action),
    Addr(Addr, Action),
}

/// Owns the subscription socket and the NEW-vs-CHANGE caches. Long-lived:
/// one instance for the daemon's whole run.
pub struct Subscription {
    socket: netlink_sys::Socket,
    routes_seen: HashSet<RouteKey>,
    addrs_seen: HashSet<AddrKey>,
}

impl Subscription {
    /// Bind the subscription socket and warm the caches from the kernel's
    /// current state, so the very first notification can already be told
    /// apart as NEW or CHANGE.
    pub fn open() -> anyhow::Result<Subscription> {
        let mut socket = netlink_sys::Socket::new(NETLINK_ROUTE)
            .map_err(|e| anyhow!("failed to allocate subscription socket: {}", e))?;
        socket
            .bind(&SocketAddr::new(0, SUBSCRIBED_GROUPS))
            .map_err(|e| anyhow!("failed to subscribe to routing multicast groups: {}", e))?;

        let routes_seen = route::route_list_all()?.iter().map(route_key).collect();
        let addrs_seen = addr::addr_list_all()?.iter().map(addr_key).collect();

        Ok(Subscription {
            socket,
            routes_seen,
            addrs_seen,
        })
    }

    /// Block until at least one datagram arrives, then dispatch every event
    /// it contains to `handler`, one read per call.
    pub fn poll(&mut self, handler: &mut dyn FnMut(Event)) -> anyhow::Result<()> {
        let mut src = BytesMut::with_capacity(READ_CAPACITY);
        src.reserve(READ_CAPACITY);
        self.socket
            .recv(&mut src, 0)
            .map_err(|e| anyhow!("IO error reading subscription socket: {}", e))?;

        while !src.is_empty() {
            let len = match NetlinkBuffer::new_checked(src.as_ref()) {
                Ok(buf) => buf.length() as usize,
                Err(e) => {
                    error!("failed to decode subscription datagram, dropping buffer: {:?}", e);
                    break;
                }
            };
            let bytes = src.split_to(len.min(src.len()));
            match NetlinkMessage::<RtnlMessage>::deserialize(&bytes) {
                Ok(msg) => self.dispatch_one(msg, handler),
                Err(e) => error!("failed to decode subscription message: {}", e),
            }
        }
        Ok(())
    }

    fn dispatch_one(&mut self, msg: NetlinkMessage<RtnlMessage>, handler: &mut dyn FnMut(Event)) {
        let inner = match msg.payload {
            NetlinkPayload::InnerMessage(inner) => inner,
            _ => return,
        };

        match inner {
            RtnlMessage::NewRoute(raw) => match route::route_from_message(raw) {
                Ok(r) => {
                    let key = route_key(&r);
                    let action = if self.routes_seen.insert(key) {
                        Action::New
                    } else {
                        Action::Change
                    };
                    handler(Event::Route(r, action));
                }
                Err(e) => error!("failed to parse route notification: {}", e),
            },
            RtnlMessage::DelRoute(raw) => match route::route_from_message(raw) {
                Ok(r) => {
                    self.routes_seen.remove(&route_key(&r));
                    handler(Event::Route(r, Action::Del));
                }
                Err(e) => error!("failed to parse route notification: {}", e),
            },
            RtnlMessage::NewAddress(raw) => match addr::msg_to_addr(&raw) {
                Ok(a) => {
                    let key = addr_key(&a);
                    let action = if self.addrs_seen.insert(key) {
                        Action::New
                    } else {
                        Action::Change
                    };
                    handler(Event::Addr(a, action));
                }
                Err(e) => error!("failed to parse address notification: {}", e),
            },
            RtnlMessage::DelAddress(raw) => match addr::msg_to_addr(&raw) {
                Ok(a) => {
                    self.addrs_seen.remove(&addr_key(&a));
                    handler(Event::Addr(a, Action::Del));
                }
                Err(e) => error!("failed to parse address notification: {}", e),
            },
            other => {
                warn!("poll: unhandled subscription message {:?}", other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NextHop;
    use crate::nl_type::FAMILY_V4;

    fn route(ifindex: u32) -> Route {
        Route {
            family: FAMILY_V4,
            table: netlink_packet_route::RT_TABLE_MAIN as u32,
            protocol: crate::model::ROUTE_PROTOCOL_KERNEL,
            dst: Some("10.0.0.0/24".parse().unwrap()),
            next_hops: vec![NextHop {
                ifindex,
                gateway: None,
            }],
            metrics: Default::default(),
        }
    }

    #[test]
    fn route_key_is_stable_across_clones() {
        assert_eq!(route_key(&route(3)), route_key(&route(3).clone()));
    }

    #[test]
    fn route_key_differs_by_next_hop() {
        assert_ne!(route_key(&route(3)), route_key(&route(4)));
    }

    #[test]
    #[ignore = "requires a live NETLINK_ROUTE socket and CAP_NET_ADMIN"]
    fn can_open_a_subscription() {
        Subscription::open().unwrap();
    }
}
