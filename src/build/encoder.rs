//! Selection encoder.
//!
//! Turns a (layer → chosen item) mapping into a fixed-width positional
//! string, one field per layer, ordered by `build_order`. Pure over its
//! inputs: no I/O, no clock, safe to memoize by (catalog version,
//! selection).
//!
//! # Alphabet
//!
//! Base 36 uses digits `0-9` then lowercase `a-z`; base 16 is standard
//! lowercase hex (the first sixteen characters of the same alphabet).
//! Fields are left zero-padded to the configured width.

use crate::catalog::{resolve_selected_item, SceneContext, Selection};
use crate::error::EncodeError;

/// Digit alphabet for base-36 fields; base-16 uses its first 16 characters.
pub const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Render one layer's item index as a fixed-width field.
///
/// `base` 16 selects hexadecimal; any other value selects base 36, matching
/// the catalog contract where `configStringBase` is advisory rather than an
/// open-ended radix.
///
/// # Errors
///
/// [`EncodeError::Overflow`] when the index does not fit in `chars` digits
/// of the effective base. The field width is a catalog responsibility, and
/// silently truncating would make two different selections share a build
/// string - so this fails loudly instead.
pub fn encode_field(
    layer_id: &str,
    index: u32,
    base: u32,
    chars: usize,
) -> Result<String, EncodeError> {
    let effective_base: u32 = if base == 16 { 16 } else { 36 };

    let fits = match (effective_base as u64).checked_pow(chars as u32) {
        Some(capacity) => (index as u64) < capacity,
        // A width this large can hold any u32 index.
        None => true,
    };
    if !fits {
        return Err(EncodeError::Overflow {
            layer_id: layer_id.to_string(),
            index,
            base: effective_base,
            chars,
        });
    }

    let mut digits = Vec::with_capacity(chars);
    let mut remaining = index;
    while remaining > 0 {
        digits.push(BASE36_ALPHABET[(remaining % effective_base) as usize]);
        remaining /= effective_base;
    }
    while digits.len() < chars {
        digits.push(b'0');
    }
    digits.reverse();

    Ok(digits.into_iter().map(char::from).collect())
}

/// Encode a full selection into the build-string body (no scene prefix).
///
/// Layers are visited in ascending `build_order` (stable for ties). For
/// each layer the chosen item is resolved under the neutral-on-missing
/// policy: no entry, a null/empty entry, and an unknown item id all encode
/// as index 0. A resolved item contributes its catalog `index` verbatim -
/// the index is never derived from list position.
pub fn build_string(ctx: &SceneContext, selection: &Selection) -> Result<String, EncodeError> {
    let mut result = String::with_capacity(ctx.layers.len() * ctx.build_chars);

    for layer in ctx.layers_in_build_order() {
        let index = resolve_selected_item(layer, selection)
            .map(|item| item.index)
            .unwrap_or(0);

        result.push_str(&encode_field(
            &layer.id,
            index,
            ctx.config_string_base,
            ctx.build_chars,
        )?);
    }

    Ok(result)
}
