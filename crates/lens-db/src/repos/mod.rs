//! Repository modules, one per aggregate.
//!
//! Each file adds methods to `LensService`.

pub mod reports;
pub mod requests;
pub mod sites;
