//! Data model shared across the hazdoc crates.
//!
//! - [`FieldMap`] / [`FieldValue`]: the flat, insertion-ordered key -> value dictionary that
//!   every template fill consumes.
//! - [`keys`]: canonical field keys plus [`normalize`], which maps reference-data column names
//!   onto them.
//! - [`address`]: fixed-width word wrapping for multi-line address fields.
//! - [`declaration`]: the operator-facing declaration form and its mandatory-field checks.

pub mod address;
pub mod declaration;
mod fields;
pub mod keys;

pub use address::{wrap, DEFAULT_ADDRESS_WIDTH};
pub use declaration::{
    Declaration, DeclarationError, LimitedQuantity, MarinePollutant, NatureOfCargo,
};
pub use fields::{FieldMap, FieldValue};
pub use keys::{normalize, normalize_key};
