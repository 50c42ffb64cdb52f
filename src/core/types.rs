/*!
 * Core Types
 * Common scalar types used across the engine
 */

/// Automaton state index
pub type StateId = u32;

/// Permission bitmask
pub type PermMask = u32;

/// User id carried in credentials and audit records
pub type Uid = u32;

/// Caller-side identity handed to a [`crate::label::LabelResolver`]
pub type SubjectId = u32;

/// Address family number (AF_*)
pub type Family = u16;

/// Big-endian encoding of a 16-bit descriptor field
#[inline]
pub fn be16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}
