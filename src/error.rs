//! Library error types.

use std::fmt;

/// A rev-pack Result, normally returning a rev-pack [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A rev-pack error. Encompasses any issue that can happen while encoding
/// values, parsing them back, or working with a revision tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The output buffer has grown past what a 32-bit offset can address, so
    /// string sharing can no longer record positions in it.
    OutputTooLarge,
    /// A container was finalized with the wrong number of elements, or a
    /// write would exceed the container's declared element count.
    CountMismatch {
        /// The element count the container was declared with
        expected: u32,
        /// The number of elements actually supplied
        actual: u32,
    },
    /// A value the format cannot represent: a NaN float, a zero-length
    /// revision id, a zero extern-string id, and the like.
    InvalidValue(String),
    /// Raw revision-tree data failed a structural check.
    CorruptRevisionData(&'static str),
    /// The delta codec failed, or a delta's reference body could not be
    /// loaded.
    DeltaFailure(String),
    /// Compressing a revision against the proposed reference would create a
    /// cycle of delta references.
    CycleAttempted,
    /// Basic value encoding failure found while parsing.
    BadEncode(String),
    /// Encoded value data ended too early.
    LengthTooShort {
        /// What step of the decoding we were on when it failed.
        step: &'static str,
        /// The actual number of bytes remaining
        actual: usize,
        /// The number of bytes the step needed
        expected: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::OutputTooLarge => {
                write!(f, "Output exceeds the 32-bit offset range")
            }
            Error::CountMismatch { expected, actual } => write!(
                f,
                "Container declared {} elements, but got {}",
                expected, actual
            ),
            Error::InvalidValue(ref err) => write!(f, "Invalid value: {}", err),
            Error::CorruptRevisionData(err) => {
                write!(f, "Corrupt revision data: {}", err)
            }
            Error::DeltaFailure(ref err) => write!(f, "Delta codec failure: {}", err),
            Error::CycleAttempted => {
                write!(f, "Delta compression would create a reference cycle")
            }
            Error::BadEncode(ref err) => write!(f, "Basic data encoding failure: {}", err),
            Error::LengthTooShort {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected data length {}, but got {} on step [{}]",
                expected, actual, step
            ),
        }
    }
}

impl std::error::Error for Error {}
