//! Policy rule mutation and enumeration. Builds and sends
//! `RtnlMessage::{New,Del,Get}Rule` requests the same way [`crate::route`]
//! builds route requests: a header struct plus a flat `Nla` list,
//! dispatched through a fresh [`NetlinkHandle`] per call.

use netlink_packet_core::{NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REQUEST};
use netlink_packet_route::rule::{Nla, RuleMessage};
use netlink_packet_route::RtnlMessage;

use crate::handle::NetlinkHandle;
use crate::model::{Rule, FR_ACT_TO_TBL};
use crate::nl_type::{Family, FAMILY_ALL};
use crate::utils;

fn new_rule_msg() -> RuleMessage {
    let mut msg = RuleMessage::default();
    msg.header.action = FR_ACT_TO_TBL;
    msg
}

fn build_message(rule: &Rule) -> anyhow::Result<RuleMessage> {
    let src = rule
        .src
        .ok_or_else(|| anyhow::anyhow!("rule has no source selector"))?;

    let mut msg = new_rule_msg();
    msg.header.family = rule.family;
    msg.header.src_len = src.prefix();
    msg.header.action = rule.action;
    msg.nlas.push(Nla::Source(utils::ip_to_bytes(&src.ip())));

    if rule.table > u8::MAX as u32 {
        msg.header.table = 0;
        msg.nlas.push(Nla::Table(rule.table));
    } else {
        msg.header.table = rule.table as u8;
    }

    Ok(msg)
}

pub fn rule_add(rule: &Rule) -> anyhow::Result<()> {
    let flags = NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK;
    let msg = build_message(rule)?;
    NetlinkHandle::new()?.execute(RtnlMessage::NewRule(msg), flags)?;
    Ok(())
}

pub fn rule_delete(rule: &Rule, exclusive: bool) -> anyhow::Result<()> {
    let flags = if exclusive { NLM_F_EXCL | NLM_F_ACK } else { NLM_F_ACK };
    let msg = build_message(rule)?;
    NetlinkHandle::new()?.execute(RtnlMessage::DelRule(msg), flags)?;
    Ok(())
}

/// Dump every policy rule visible to the kernel, across all families.
pub fn rule_list_all() -> anyhow::Result<Vec<Rule>> {
    let mut msg = RuleMessage::default();
    msg.header.family = FAMILY_ALL;

    let replies = NetlinkHandle::new()?.execute(
        RtnlMessage::GetRule(msg),
        NLM_F_REQUEST | NLM_F_DUMP | NLM_F_ACK,
    )?;

    let mut rules = Vec::new();
    for reply in replies {
        if let RtnlMessage::NewRule(msg) = reply {
            rules.push(msg_to_rule(&msg)?);
        }
    }
    Ok(rules)
}

fn msg_to_rule(msg: &RuleMessage) -> anyhow::Result<Rule> {
    let family = msg.header.family as Family;
    let mut table = msg.header.table as u32;
    let mut src_bytes = None;

    for nla in &msg.nlas {
        match nla {
            Nla::Table(t) => table = *t,
            Nla::Source(bytes) => src_bytes = Some(bytes.clone()),
            _ => {}
        }
    }

    let src = match src_bytes {
        Some(bytes) => {
            let ip = utils::bytes_to_ip(&bytes, family)?;
            Some(ipnetwork::IpNetwork::new(ip, msg.header.src_len)?)
        }
        None => None,
    };

    Ok(Rule {
        family,
        src,
        table,
        action: msg.header.action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_rule() -> Rule {
        Rule {
            family: crate::nl_type::FAMILY_V4,
            src: Some(ipnetwork::IpNetwork::new(Ipv4Addr::new(10, 0, 0, 5).into(), 32).unwrap()),
            table: 1003,
            action: FR_ACT_TO_TBL,
        }
    }

    #[test]
    fn build_message_overflows_table_into_nla() {
        let rule = sample_rule();
        let msg = build_message(&rule).unwrap();
        assert_eq!(msg.header.table, 0);
        assert_eq!(msg.header.src_len, 32);
        assert!(msg.nlas.iter().any(|n| matches!(n, Nla::Table(1003))));
    }

    #[test]
    fn build_message_rejects_rule_without_source() {
        let mut rule = sample_rule();
        rule.src = None;
        assert!(build_message(&rule).is_err());
    }
}
