//!
//! complaint_desk
//! --------------
//! Client library for a complaint-tracking service. End users submit and track
//! complaints; staff triage them and respond. The library owns the client-side
//! session model (credential, inferred privilege, cached profile) and the
//! complaint lifecycle model (status lattice plus append-only history), and
//! routes every authenticated call through one request gateway.

pub mod error;
pub mod config;
pub mod gateway;
pub mod identity;
pub mod complaints;
pub mod cli;

// Test-only printing helper: expands to eprintln! during tests and debug builds and is inert otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
