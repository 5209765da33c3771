//! Startup reconciliation: flush daemon-owned state, then re-materialize
//! replicas and rules from the current kernel state. Runs once, before the
//! event loop starts.

use log::{error, info};

use crate::config::Config;
use crate::model::{Action, DAEMON_TABLE_BASE};
use crate::{addr, filter, mutator, route, rule, transform};

/// Counts surfaced to the `--dump` statistics output. The `*_flushed`,
/// `routes_replicated`, and `rules_created` fields describe the actions
/// this pass took; the `*_seen` fields are the cache population sizes
/// observed while doing so (the statistics a `nl_cache_mngr_info`-style
/// dump reports).
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileStats {
    pub rules_seen: usize,
    pub rules_flushed: usize,
    pub routes_seen: usize,
    pub routes_flushed: usize,
    pub routes_replicated: usize,
    pub addrs_seen: usize,
    pub rules_created: usize,
}

pub fn reconcile(config: &Config) -> anyhow::Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    info!("reconcile: flushing policy rules in the daemon-owned range");
    let rules = rule::rule_list_all()?;
    stats.rules_seen = rules.len();
    for r in &rules {
        if r.table > DAEMON_TABLE_BASE && r.is_to_table() {
            match rule::rule_delete(r, false) {
                Ok(()) => {
                    stats.rules_flushed += 1;
                    info!("del rule-init {}", r.dump_line());
                }
                Err(e) => error!("rule_delete: {}: {}", r.dump_line(), e),
            }
        }
    }

    info!("reconcile: flushing routes in the daemon-owned range");
    let routes = route::route_list_all()?;
    stats.routes_seen = routes.len();
    for r in &routes {
        if r.table > DAEMON_TABLE_BASE {
            match route::route_delete(r, false) {
                Ok(()) => {
                    stats.routes_flushed += 1;
                    info!("del route-init {}", r.dump_line());
                }
                Err(e) => error!("route_delete: {}: {}", r.dump_line(), e),
            }
        }
    }

    info!("reconcile: replicating in-scope main-table routes");
    for r in &routes {
        if filter::route_in_scope(r) {
            let replica = transform::route_to_replica(r, config);
            mutator::apply_route(&replica, Action::New, r.protocol);
            stats.routes_replicated += 1;
        }
    }

    info!("reconcile: creating source rules for in-scope addresses");
    let addrs = addr::addr_list_all()?;
    stats.addrs_seen = addrs.len();
    for a in &addrs {
        if filter::addr_in_scope(a) {
            let rule = transform::addr_to_rule(a)?;
            mutator::apply_rule(&rule, Action::New);
            stats.rules_created += 1;
        }
    }

    Ok(stats)
}
