//! Address enumeration. The daemon only ever observes addresses — it never
//! creates or removes them — so this module carries no `addr_add`/`addr_del`.

use netlink_packet_core::{NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST};
use netlink_packet_route::address::{AddressMessage, Nla};
use netlink_packet_route::RtnlMessage;

use crate::handle::NetlinkHandle;
use crate::model::Addr;
use crate::nl_type::{Family, FAMILY_ALL};
use crate::utils;

/// Dump every address visible to the kernel, across all interfaces and families.
pub fn addr_list_all() -> anyhow::Result<Vec<Addr>> {
    let mut msg = AddressMessage::default();
    msg.header.family = FAMILY_ALL;

    let replies = NetlinkHandle::new()?.execute(
        RtnlMessage::GetAddress(msg),
        NLM_F_REQUEST | NLM_F_DUMP | NLM_F_ACK,
    )?;

    let mut addrs = Vec::new();
    for reply in replies {
        if let RtnlMessage::NewAddress(msg) = reply {
            addrs.push(msg_to_addr(&msg)?);
        }
    }
    Ok(addrs)
}

pub(crate) fn msg_to_addr(msg: &AddressMessage) -> anyhow::Result<Addr> {
    let family = msg.header.family as Family;
    let mut local = None;
    let mut address = None;

    for nla in &msg.nlas {
        match nla {
            Nla::Local(bytes) => {
                local = Some(utils::bytes_to_ip(bytes, family)?);
            }
            Nla::Address(bytes) => {
                address = Some(utils::bytes_to_ip(bytes, family)?);
            }
            _ => {}
        }
    }

    // IPv4 addresses on point-to-point-less links carry the same value in
    // both Local and Address; prefer Local when present.
    let ip = local
        .or(address)
        .ok_or_else(|| anyhow::anyhow!("address message has no local/address attribute"))?;
    let local_net = ipnetwork::IpNetwork::new(ip, msg.header.prefix_len)?;

    Ok(Addr {
        ifindex: msg.header.index,
        family,
        scope: msg.header.scope.into(),
        local: local_net,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_route::address::Nla;

    #[test]
    fn parses_local_address_and_prefix() {
        let mut msg = AddressMessage::default();
        msg.header.index = 3;
        msg.header.family = crate::nl_type::FAMILY_V4;
        msg.header.prefix_len = 24;
        msg.header.scope = 0;
        msg.nlas.push(Nla::Local(vec![10, 0, 0, 5]));

        let addr = msg_to_addr(&msg).unwrap();
        assert_eq!(addr.ifindex, 3);
        assert_eq!(addr.scope, 0);
        assert_eq!(addr.local.prefix(), 24);
        assert_eq!(addr.local.ip().to_string(), "10.0.0.5");
    }
}
