//! Fixed-width banking record fields.
//!
//! A field is described by a compact picture string (`A(20)`, `N(10)(2)`,
//! `ddmmaaaa`) or by an explicit descriptor, and encodes values into its
//! canonical fixed-width text.

pub mod field;
pub mod picture;

pub use field::{FieldDefinition, FieldDescriptor, FieldSpec, FieldValue};
pub use picture::{parse_picture, Casing, DateFormat, FieldKind, Picture};
