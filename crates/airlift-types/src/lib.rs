//! Shared protocol, catalog, and connector descriptor types for Airlift.
//!
//! This crate is dependency-light on purpose: everything here is pure data
//! plus the line-protocol parser, usable from both the engine and the sinks.

pub mod catalog;
pub mod connector;
pub mod protocol;
