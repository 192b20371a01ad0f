//! The compute phase that follows a successful authentication.
//!
//! The client sends a vector count `N`, then for every vector an element count `S` followed by
//! `S` floats. The server answers every vector with the sum of its squared elements as soon as
//! the vector has been read, before reading the next one. Field encoding is described in
//! [`wire`](crate::wire).
//!
//! ```text
//! C -> S: N
//! C -> S: S_1, x_1 .. x_S       S -> C: sum_1
//! ...
//! C -> S: S_N, x_1 .. x_S       S -> C: sum_N
//! ```
//!
//! Both counts are checked against [`Limits`] before anything they describe is read.
//! Elements are consumed in fixed size chunks so memory use does not depend on `S`.

use std::io::{Read, Write};

use crate::error::{BoundExceededError, BoundField, ConnectionError};
use crate::wire::{decode_f32, read_u32, write_f32, FIELD_LENGTH};

/// Default maximum for the number of vectors in a batch.
pub const MAXIMUM_VECTORS: u32 = 1_000_000;

/// Default maximum for the number of elements in a single vector.
pub const MAXIMUM_VECTOR_LENGTH: u32 = 10_000_000;

// Elements decoded per read while streaming a vector.
const CHUNK_ELEMENTS: usize = 1024;

/// Upper bounds for the declared counts of a batch.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Limits {
    /// Largest accepted `N`.
    pub max_vectors: u32,
    /// Largest accepted `S`.
    pub max_vector_length: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_vectors: MAXIMUM_VECTORS,
            max_vector_length: MAXIMUM_VECTOR_LENGTH,
        }
    }
}

impl Limits {
    fn check(value: u32, maximum: u32, field: BoundField) -> Result<u32, BoundExceededError> {
        if value > maximum {
            return Err(BoundExceededError {
                field,
                declared: value,
                maximum,
            });
        }

        Ok(value)
    }
}

/// What a completed batch contained.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct BatchSummary {
    /// Number of vectors answered.
    pub vectors: u32,
    /// Total number of elements across all vectors.
    pub elements: u64,
}

// Squares are summed as f64 and only narrowed to f32 at the end.
#[derive(Debug, Default)]
struct SquareSum {
    sum: f64,
}

impl SquareSum {
    fn add(&mut self, value: f32) {
        let value = f64::from(value);
        self.sum += value * value;
    }

    fn finish(self) -> f32 {
        self.sum as f32
    }
}

/// Sum of the squared elements of `values`.
///
/// Accumulates in double precision and rounds to single precision once, which is the result a
/// client receives for the same vector.
#[must_use]
pub fn sum_of_squares(values: &[f32]) -> f32 {
    let mut sum = SquareSum::default();
    for value in values {
        sum.add(*value);
    }
    sum.finish()
}

/// Runs the compute phase for a single batch.
///
/// Every result is written and flushed before the next vector is read.
/// A batch with `N = 0` reads nothing else and writes nothing.
///
/// # Errors
///
/// * [`ConnectionError::BoundExceeded`] if `N` or any `S` is above `limits`.
/// Nothing covered by the count is read.
/// * [`ConnectionError::Io`] if reading or writing fails, including the peer closing early.
pub fn run_batch<S: Read + Write>(
    stream: &mut S,
    limits: &Limits,
) -> Result<BatchSummary, ConnectionError> {
    let vectors = Limits::check(
        read_u32(stream)?,
        limits.max_vectors,
        BoundField::VectorCount,
    )?;

    let mut summary = BatchSummary::default();

    for _ in 0..vectors {
        let length = Limits::check(
            read_u32(stream)?,
            limits.max_vector_length,
            BoundField::VectorLength,
        )?;

        let result = read_sum_of_squares(stream, length)?;

        write_f32(stream, result)?;
        stream.flush()?;

        summary.vectors += 1;
        summary.elements += u64::from(length);
    }

    Ok(summary)
}

fn read_sum_of_squares<R: Read>(reader: &mut R, length: u32) -> std::io::Result<f32> {
    let mut buffer = [0_u8; CHUNK_ELEMENTS * FIELD_LENGTH];
    let mut remaining = length as usize;
    let mut sum = SquareSum::default();

    while remaining > 0 {
        let elements = remaining.min(CHUNK_ELEMENTS);
        let chunk = &mut buffer[..elements * FIELD_LENGTH];
        reader.read_exact(chunk)?;

        for field in chunk.chunks_exact(FIELD_LENGTH) {
            sum.add(decode_f32([field[0], field[1], field[2], field[3]]));
        }

        remaining -= elements;
    }

    Ok(sum.finish())
}
