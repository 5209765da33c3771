//! Wires the Netlink Client's subscription to the Filter → Transformer →
//! Mutator pipeline and drives the event loop. `main` constructs one of
//! these and calls `run`, which never returns under normal operation.

use log::info;

use crate::config::Config;
use crate::model::{Action, Addr, Route};
use crate::monitor::{Event, Subscription};
use crate::reconcile::{self, ReconcileStats};
use crate::{filter, mutator, transform};

pub struct Daemon {
    config: Config,
    subscription: Subscription,
}

impl Daemon {
    /// Open the subscription socket. Reconciliation is run separately via
    /// [`Daemon::reconcile`] so `main` can report its stats before entering
    /// the loop.
    pub fn new(config: Config) -> anyhow::Result<Daemon> {
        let subscription = Subscription::open()?;
        Ok(Daemon {
            config,
            subscription,
        })
    }

    pub fn reconcile(&self) -> anyhow::Result<ReconcileStats> {
        reconcile::reconcile(&self.config)
    }

    /// Blocks forever, dispatching subscription events through the
    /// pipeline. Returns only if the subscription socket itself fails.
    pub fn run(&mut self) -> anyhow::Result<()> {
        info!("entering event loop");
        let config = self.config.clone();
        loop {
            self.subscription.poll(&mut |event| match event {
                Event::Route(route, action) => handle_route_event(&route, action, &config),
                Event::Addr(addr, action) => handle_addr_event(&addr, action),
            })?;
        }
    }
}

fn handle_route_event(route: &Route, action: Action, config: &Config) {
    if !filter::route_in_scope(route) {
        return;
    }
    match action {
        Action::New | Action::Change | Action::Del => {
            let replica = transform::route_to_replica(route, config);
            mutator::apply_route(&replica, action, route.protocol);
        }
        Action::Other => {
            log::warn!("event loop: unhandled route action");
        }
    }
}

fn handle_addr_event(addr: &Addr, action: Action) {
    if !filter::addr_in_scope(addr) {
        return;
    }
    match action {
        Action::New | Action::Del => match transform::addr_to_rule(addr) {
            Ok(rule) => mutator::apply_rule(&rule, action),
            Err(e) => log::error!("addr_to_rule: {}: {}", addr.dump_line(), e),
        },
        Action::Change => {
            // Addresses' non-identity attributes aren't relevant to the
            // rule they produce.
        }
        Action::Other => {
            log::warn!("event loop: unhandled address action");
        }
    }
}
