//! # Shared Types Crate
//!
//! Value types shared by every Conduit subsystem.
//!
//! ## Design Principles
//!
//! - **Explicit Type Tags**: types are identified by stable names chosen at
//!   registration time (`TypeTag`), never by compiler-assigned identity.
//! - **Owned Identities**: objects and components are addressed by string
//!   identifiers (`ObjectId`, `ComponentId`) so configuration documents and
//!   runtime notifications speak the same language.
//! - **No Logic**: this crate holds data definitions only; behaviour lives in
//!   the numbered subsystem crates.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
