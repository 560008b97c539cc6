//! Domain layer: pure types and derivations, plus the ports to the store.

pub mod access;
pub mod ids;
pub mod ordering;
pub mod payment;
pub mod ports;
pub mod project;
pub mod subscription;
pub mod workflow;
