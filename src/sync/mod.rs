//! Zone Reconciliation
//!
//! This module turns a transferred source zone into the minimal set of
//! changes that makes the hosted target zone match it:
//!
//! * `names` - rebasing node names between origins and domain scoping
//! * `convert` - re-addressing a whole zone under the target origin
//! * `diff` - comparing two zone snapshots into ordered diff entries
//! * `change` - building the provider's change batch from diff entries
//! * `provider` - hosted zone provider access and target zone assembly
//! * `context` - validated configuration and injected collaborators
//! * `orchestrator` - the per-domain mirror run with its serial guard

/// Provider change records and the change builder
pub mod change;

/// Validated configuration and the shared sync context
pub mod context;

/// Zone conversion across origins
pub mod convert;

/// Zone snapshot diffing
pub mod diff;

/// Node name rebasing and domain scoping
pub mod names;

/// Per-domain mirror orchestration
pub mod orchestrator;

/// Hosted zone provider client
pub mod provider;
