//! Utilities to handle EO data encryption.
//!
//! Packets and data files are obfuscated with three symmetric byte-level
//! transforms: interleaving, flipping the most significant bit of each byte,
//! and reversing runs of bytes divisible by a "multiple" value negotiated
//! during connection initialization.

use std::fmt;

mod server_verification;

pub use self::server_verification::server_verification_hash;

/// An error returned when a byte transform is given an invalid argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncryptError {
    /// A negative multiple value was passed to [`swap_multiples`].
    NegativeMultiple(i32),
}

impl fmt::Display for EncryptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EncryptError::NegativeMultiple(multiple) => {
                write!(f, "multiple must be a positive number, got {}", multiple)
            }
        }
    }
}

impl std::error::Error for EncryptError {}

/// Interleaves a sequence of bytes. When encrypting EO data, bytes are
/// "woven" into each other.
///
/// ```text
/// [0, 1, 2, 3, 4, 5] -> [0, 5, 1, 4, 2, 3]
/// ```
///
/// This is an in-place operation.
pub fn interleave(data: &mut [u8]) {
    let mut buffer = vec![0; data.len()];
    let mut ii = 0;

    let mut i = 0;
    while i < data.len() {
        buffer[i] = data[ii];
        i += 2;
        ii += 1;
    }

    let mut i = i as isize - 1;
    if data.len() % 2 != 0 {
        i -= 2;
    }

    while i >= 0 {
        buffer[i as usize] = data[ii];
        i -= 2;
        ii += 1;
    }

    data.copy_from_slice(&buffer);
}

/// Deinterleaves a sequence of bytes. This is the reverse of [`interleave`].
///
/// ```text
/// [0, 1, 2, 3, 4, 5] -> [0, 2, 4, 5, 3, 1]
/// ```
///
/// This is an in-place operation.
pub fn deinterleave(data: &mut [u8]) {
    let mut buffer = vec![0; data.len()];
    let mut ii = 0;

    let mut i = 0;
    while i < data.len() {
        buffer[ii] = data[i];
        i += 2;
        ii += 1;
    }

    let mut i = i as isize - 1;
    if data.len() % 2 != 0 {
        i -= 2;
    }

    while i >= 0 {
        buffer[ii] = data[i as usize];
        i -= 2;
        ii += 1;
    }

    data.copy_from_slice(&buffer);
}

/// Flips the most significant bit of each byte in a sequence of bytes.
/// (Values 0 and 128 are not flipped.)
///
/// This is an in-place operation.
pub fn flip_msb(data: &mut [u8]) {
    for byte in data.iter_mut() {
        if *byte & 0x7F != 0 {
            *byte ^= 0x80;
        }
    }
}

/// Swaps the order of contiguous runs of bytes that are divisible by the
/// given multiple value.
///
/// ```text
/// multiple = 3
/// [10, 21, 27] -> [10, 27, 21]
/// ```
///
/// A multiple of 0 leaves the data untouched; a negative multiple is an
/// error. This is an in-place operation.
pub fn swap_multiples(data: &mut [u8], multiple: i32) -> Result<(), EncryptError> {
    if multiple < 0 {
        return Err(EncryptError::NegativeMultiple(multiple));
    }

    if multiple == 0 {
        return Ok(());
    }

    let multiple = multiple as u32;
    let mut sequence_length = 0;

    for i in 0..=data.len() {
        if i != data.len() && u32::from(data[i]) % multiple == 0 {
            sequence_length += 1;
        } else {
            if sequence_length > 1 {
                data[i - sequence_length..i].reverse();
            }
            sequence_length = 0;
        }
    }

    Ok(())
}
