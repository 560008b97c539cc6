//! Application layer orchestrating the domain against the store ports.
//!
//! The [`subscription_store::SubscriptionStore`] publishes the tenant's state
//! over a `tokio` watch channel, the [`guard::CrudGuard`] gates mutations on
//! it, and [`engine::WorkspaceEngine`] wires both to the workflow and payment
//! services.

pub mod engine;
pub mod guard;
pub mod payments;
pub mod reorder;
pub mod subscription_store;
pub mod template;
