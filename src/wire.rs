//! Primitive fields of the compute phase.
//!
//! Every integer and float bit pattern is **big endian** (network order) in both directions.
//! Floats are reinterpreted from their bit pattern, never converted numerically.

use std::io::{Read, Write};

/// Server response to an accepted claim.
pub const STATUS_OK: &[u8; 2] = b"OK";

/// Server response to a malformed or rejected claim.
pub const STATUS_ERR: &[u8; 3] = b"ERR";

/// Size of every compute phase field.
pub const FIELD_LENGTH: usize = std::mem::size_of::<u32>();

/// Reads a count field.
///
/// # Errors
///
/// Has the same errors as [`std::io::Read::read_exact`].
pub fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0_u8; FIELD_LENGTH];
    reader.read_exact(&mut buf)?;

    Ok(u32::from_be_bytes(buf))
}

/// Writes a count field.
///
/// # Errors
///
/// Has the same errors as [`std::io::Write::write_all`].
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Reads a float field.
///
/// # Errors
///
/// Has the same errors as [`std::io::Read::read_exact`].
pub fn read_f32<R: Read>(reader: &mut R) -> std::io::Result<f32> {
    Ok(f32::from_bits(read_u32(reader)?))
}

/// Writes a float field.
///
/// # Errors
///
/// Has the same errors as [`std::io::Write::write_all`].
pub fn write_f32<W: Write>(writer: &mut W, value: f32) -> std::io::Result<()> {
    write_u32(writer, value.to_bits())
}

/// Decodes a float from an already received field.
#[must_use]
pub fn decode_f32(field: [u8; FIELD_LENGTH]) -> f32 {
    f32::from_bits(u32::from_be_bytes(field))
}

/// Encodes a float into a field.
#[must_use]
pub fn encode_f32(value: f32) -> [u8; FIELD_LENGTH] {
    value.to_bits().to_be_bytes()
}
