//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tasklink_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("tasklink_core ping={}", tasklink_core::ping());
    println!("tasklink_core version={}", tasklink_core::core_version());
}
