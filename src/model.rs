//! Plain data types shared by the filter, transform, mutate and reconcile
//! stages. These are intentionally dumb: no netlink wire knowledge lives
//! here, only the attributes the pipeline reasons about.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::{IpNetwork, Ipv4Network};

pub type Scope = u8;
pub type RouteProtocol = u8;

/// Routes the kernel manages itself (directly-attached subnets, etc).
pub const ROUTE_PROTOCOL_KERNEL: RouteProtocol = 2;

/// A single routed next hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    pub ifindex: u32,
    pub gateway: Option<IpAddr>,
}

/// A kernel route, main-table or otherwise.
#[derive(Debug, Clone)]
pub struct Route {
    pub family: u8,
    pub table: u32,
    pub protocol: RouteProtocol,
    pub dst: Option<IpNetwork>,
    pub next_hops: Vec<NextHop>,
    pub metrics: BTreeMap<u8, u32>,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            family: 0,
            table: 0,
            protocol: 0,
            dst: None,
            next_hops: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }
}

impl Route {
    /// The single next-hop interface index, when this route has exactly one.
    pub fn sole_ifindex(&self) -> Option<u32> {
        match self.next_hops.as_slice() {
            [hop] => Some(hop.ifindex),
            _ => None,
        }
    }

    pub fn dump_line(&self) -> String {
        let dst = self
            .dst
            .map(|d| d.to_string())
            .unwrap_or_else(|| "default".to_string());
        let hop = self
            .next_hops
            .first()
            .map(|h| format!("dev-idx {} via {:?}", h.ifindex, h.gateway))
            .unwrap_or_default();
        format!(
            "{} table {} proto {} {}",
            dst, self.table, self.protocol, hop
        )
    }
}

/// A local address attached to an interface.
#[derive(Debug, Clone)]
pub struct Addr {
    pub ifindex: u32,
    pub family: u8,
    pub scope: Scope,
    pub local: IpNetwork,
}

impl Default for Addr {
    fn default() -> Self {
        Self {
            ifindex: 0,
            family: 0,
            scope: 0,
            local: IpNetwork::V4(Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0).unwrap()),
        }
    }
}

impl Addr {
    pub fn dump_line(&self) -> String {
        format!(
            "{} dev-idx {} scope {}",
            self.local, self.ifindex, self.scope
        )
    }
}

/// FRA_ACTION values; only `ToTable` matters to this daemon.
pub const FR_ACT_TO_TBL: u8 = 1;

/// A policy-routing rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub family: u8,
    pub src: Option<IpNetwork>,
    pub table: u32,
    pub action: u8,
}

impl Rule {
    pub fn is_to_table(&self) -> bool {
        self.action == FR_ACT_TO_TBL
    }

    pub fn dump_line(&self) -> String {
        let src = self
            .src
            .map(|s| s.to_string())
            .unwrap_or_else(|| "all".to_string());
        format!("from {} lookup {}", src, self.table)
    }
}

/// The action an event (or a reconciliation replay) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    New,
    Del,
    Change,
    /// A netlink message type neither this daemon nor the filter stage
    /// recognizes for the object class it arrived on. Logged and dropped.
    Other,
}

/// The daemon's reserved table-id range starts here; `1000 + ifindex` is
/// the table a replica route or source rule for interface `ifindex` lives in.
pub const DAEMON_TABLE_BASE: u32 = 1000;

/// The daemon-owned table id for a given interface index.
pub fn daemon_table_for(ifindex: u32) -> u32 {
    DAEMON_TABLE_BASE + ifindex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sole_ifindex_requires_exactly_one_hop() {
        let mut r = Route::default();
        assert_eq!(r.sole_ifindex(), None);
        r.next_hops.push(NextHop {
            ifindex: 3,
            gateway: None,
        });
        assert_eq!(r.sole_ifindex(), Some(3));
        r.next_hops.push(NextHop {
            ifindex: 4,
            gateway: None,
        });
        assert_eq!(r.sole_ifindex(), None);
    }
}
