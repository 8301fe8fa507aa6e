//! Build-string encoding and cache-key derivation.
//!
//! A build string is the deterministic, fixed-width encoding of a full
//! layer selection: one field per layer in `build_order`, prefixed by the
//! scene index. It doubles as a human-inspectable identifier and as the
//! storage key suffix under which the rendered tiles are published - which
//! is what makes "has this been rendered before?" a single existence check.
//!
//! # Components
//!
//! - [`build_string`]: selection → positional string (pure, deterministic)
//! - [`key`]: build string → tile root / metadata key / 2D render key

mod encoder;
pub mod key;

pub use encoder::{build_string, encode_field, BASE36_ALPHABET};
