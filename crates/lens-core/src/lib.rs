//! # lens-core
//!
//! Core types, ID generation, and error types for Sitelens.
//!
//! This crate provides the foundational types shared across all Sitelens crates:
//! - Entity structs for the domain objects (sites, audit requests, source results, reports)
//! - Status enums with state machine transitions
//! - ID prefix constants
//! - Tier limits
//! - Cross-cutting error types
//! - API response types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod responses;
pub mod tier;
