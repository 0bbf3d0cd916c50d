//! Library crate for matchday-back, exposing modules for the binary and integration tests.

pub mod config;
pub mod dao;
pub mod error;
pub mod services;
pub mod state;
