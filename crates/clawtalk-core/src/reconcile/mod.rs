//! Reconciliation against the host's own config file: `RoutingReconciler`
//! (C10), which projects Talk bindings onto the host's agent routing table,
//! and `OwnershipDoctor` (C11), which only detects overlap between the two.

mod doctor;
mod reconciler;
mod types;

pub use doctor::{check_ownership, Conflict};
pub use reconciler::{compute_next_config, managed_agent_id, reconcile_once};
pub use types::{
    AccountMode, HostAccount, HostAgent, HostBinding, HostMatch, OpenClawConfig, PeerRef,
    ReconcileError, Sandbox,
};
