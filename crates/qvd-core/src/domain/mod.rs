//! Domain entities for the QVD client.
//!
//! This module contains pure types with no wire or infrastructure concerns.
//!
//! # What is "domain" here? (for beginners)
//!
//! The domain layer holds the concepts a user of the client thinks in: a
//! virtual machine they can open, the list of those machines the broker
//! returned, and the size of the window they want.  None of this code knows
//! about HTTP, JSON, or base64; the `protocol` module translates between the
//! broker's bytes and these types.

/// Display geometry (`WxH`) validated at construction.
pub mod geometry;

/// The VM entity and the ordered catalog returned by one list request.
///
/// See [`vm::VmCatalog`] for the main type.
pub mod vm;
