//! Zonemirror
//!
//! Mirrors on-premises authoritative DNS zones into a cloud-hosted zone that
//! may live under a different origin suffix.
//!
//! # Features
//!
//! * Full zone transfers (AXFR) over TCP from an on-premises master
//! * Master server discovery with a short liveness probe over UDP
//! * Origin rebasing, so several source zones can be aggregated into one
//!   hosted zone under a different suffix
//! * Minimal, idempotent change batches (create/upsert/delete) submitted to
//!   the hosted zone provider as one atomic unit per domain
//! * A serial marker embedded in the hosted zone that guards against
//!   regressive overwrites of newer state
//!
//! # Architecture
//!
//! The crate is divided into two main modules:
//! * `dns` - wire protocol handling, zone snapshots and master clients
//! * `sync` - the reconciliation core and the hosted zone provider client

/// DNS wire protocol, zone snapshots and master server clients
pub mod dns;

/// Reconciliation core and hosted zone provider access
pub mod sync;
