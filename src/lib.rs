//! Wake-log-sleep environmental data logger firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod calendar;
pub mod config;
pub mod error;
pub mod fsm;
pub mod poll;
pub mod protocol;
pub mod record;
pub mod schedule;

pub mod adapters;

pub mod pins;
