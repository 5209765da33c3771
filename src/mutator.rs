//! Issues the actual add/delete/replace calls for a derived object and
//! classifies the result as benign or real.

use std::io::ErrorKind;

use log::{error, info, warn};

use crate::model::{Action, RouteProtocol, Route, Rule, ROUTE_PROTOCOL_KERNEL};
use crate::route;

fn io_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<std::io::Error>().map(|e| e.kind())
}

/// Apply `action` to a replica route. `origin_protocol` is the protocol of
/// the *original* route this replica was derived from; it's only consulted
/// on DEL, to decide whether a NotFound failure is the kernel's own GC.
pub fn apply_route(replica: &Route, action: Action, origin_protocol: RouteProtocol) {
    match action {
        Action::New => match route::route_add(replica) {
            Ok(()) => info!("new route {}", replica.dump_line()),
            Err(e) if io_kind(&e) == Some(ErrorKind::AlreadyExists) => {
                warn!("new route {}: already exists", replica.dump_line());
            }
            Err(e) => error!("route_add: {}: {}", replica.dump_line(), e),
        },
        Action::Change => match route::route_replace(replica) {
            Ok(()) => info!("chg route {}", replica.dump_line()),
            Err(e) => error!("route_replace: {}: {}", replica.dump_line(), e),
        },
        Action::Del => match route::route_delete(replica, true) {
            Ok(()) => info!("del route {}", replica.dump_line()),
            Err(e) if io_kind(&e) == Some(ErrorKind::NotFound)
                && origin_protocol == ROUTE_PROTOCOL_KERNEL =>
            {
                // The kernel already reclaimed the replica when it reclaimed
                // the directly-attached route it mirrors.
            }
            Err(e) => error!("route_delete: {}: {}", replica.dump_line(), e),
        },
        Action::Other => warn!("mutator: unhandled action for route {}", replica.dump_line()),
    }
}

/// Apply `action` to a source rule. Rules only ever see NEW or DEL; CHANGE
/// on an address never reaches here (the Filter drops it).
pub fn apply_rule(the_rule: &Rule, action: Action) {
    match action {
        Action::New => match crate::rule::rule_add(the_rule) {
            Ok(()) => info!("new rule {}", the_rule.dump_line()),
            Err(e) if io_kind(&e) == Some(ErrorKind::AlreadyExists) => {
                warn!("new rule {}: already exists", the_rule.dump_line());
            }
            Err(e) => error!("rule_add: {}: {}", the_rule.dump_line(), e),
        },
        Action::Del => match crate::rule::rule_delete(the_rule, true) {
            Ok(()) => info!("del rule {}", the_rule.dump_line()),
            Err(e) if io_kind(&e) == Some(ErrorKind::NotFound) => {
                warn!("del rule {}: already gone", the_rule.dump_line());
            }
            Err(e) => error!("rule_delete: {}: {}", the_rule.dump_line(), e),
        },
        Action::Change | Action::Other => {
            warn!("mutator: unhandled action for rule {}", the_rule.dump_line());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kind_unwraps_downcastable_errors() {
        let err = anyhow::Error::new(std::io::Error::from(ErrorKind::NotFound));
        assert_eq!(io_kind(&err), Some(ErrorKind::NotFound));
    }

    #[test]
    fn io_kind_is_none_for_other_error_types() {
        let err = anyhow::anyhow!("some other failure");
        assert_eq!(io_kind(&err), None);
    }
}
