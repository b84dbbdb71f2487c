//! Library crate for party-room: a room sync engine for phone-controlled
//! party games, exposing modules for binaries and integration tests.

pub mod agent;
pub mod clock;
pub mod config;
mod dto;
pub mod engine;
pub mod error;
pub mod identity;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod store;
