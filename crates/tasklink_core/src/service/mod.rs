//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the mutation entry points that keep
//!   task/owner cross references consistent.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - Precondition failures (validation, missing target, missing assignee,
//!   email conflict) abort before any store mutation.
//! - Compensating updates are issued in a fixed order so that a partial
//!   failure leaves recoverable state, never a dangling reference to a
//!   deleted record.

pub mod owner_service;
pub mod task_service;
