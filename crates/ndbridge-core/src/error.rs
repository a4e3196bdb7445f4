use crate::device::{Device, DeviceKind};
use crate::dtype::DType;
use crate::layout::Order;
use crate::owner::OwnerId;
use crate::shape::Shape;

// Errors are split by who is at fault:
//
//   LayoutError      — the foreign array does not satisfy a declared constraint.
//                      Reported to the caller, never fatal.
//   LifetimeError    — the host integration misused acquire/release.
//                      A programming defect, see `LifetimePolicy`.
//   UnsupportedError — the runtime specializer has no entry for a (dtype, ndim).
//
// Every variant carries the expected and the observed value so a rejected
// array can be reported precisely instead of as a generic "incompatible array".

/// A foreign array was rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch { expected: DType, actual: DType },

    #[error("device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch { expected: DeviceKind, actual: Device },

    #[error("rank mismatch: expected {expected} dimensions, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// A fixed extent did not match on `axis`.
    #[error("shape mismatch on axis {axis}: expected extent {expected}, got {actual}")]
    ShapeMismatch {
        axis: usize,
        expected: usize,
        actual: usize,
    },

    /// The strides do not describe the required packing.
    #[error("layout mismatch: expected {expected} contiguous, got {shape}, strides {strides:?}")]
    LayoutMismatch {
        expected: Order,
        shape: Shape,
        strides: Vec<isize>,
    },

    /// The data pointer is null or not aligned for the requested element type.
    #[error("misaligned data: address {address:#x} is not a valid {dtype} pointer (align {align})")]
    Misaligned {
        dtype: DType,
        address: usize,
        align: usize,
    },

    /// The descriptor's owner reference was given up behind its back, so the
    /// memory it points to may already be freed.
    #[error("owner {owner:?} of the array was already released")]
    OwnerReleased { owner: OwnerId },

    /// Mutable access needs the descriptor exclusively, but other views or
    /// descriptor clones still reach the same elements.
    #[error("array is shared by {holders} other views or descriptors")]
    Shared { holders: usize },
}

/// Misuse of the ownership protocol by the host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifetimeError {
    /// `release` on a token whose deleter already ran.
    #[error("double release of owner {owner:?}")]
    DoubleRelease { owner: OwnerId },

    /// `acquire` on a token whose deleter already ran.
    #[error("use after release of owner {owner:?}")]
    UseAfterRelease { owner: OwnerId },
}

impl LifetimeError {
    pub fn owner(&self) -> OwnerId {
        match *self {
            LifetimeError::DoubleRelease { owner } | LifetimeError::UseAfterRelease { owner } => {
                owner
            }
        }
    }
}

/// No specialized view exists for the observed array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported array: dtype {dtype}, {ndim} dimensions on {device}")]
pub struct UnsupportedError {
    pub dtype: DType,
    pub ndim: usize,
    pub device: Device,
}

/// All errors produced by ndbridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Lifetime(#[from] LifetimeError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),

    /// `describe` needs exactly one stride per axis.
    #[error("stride rank mismatch: shape has {shape_rank} dimensions, strides have {strides_rank}")]
    StrideRankMismatch {
        shape_rank: usize,
        strides_rank: usize,
    },

    /// A buffer handed to an export function has the wrong length for its shape.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// A layout addresses elements outside the buffer it is exported over.
    #[error("layout addresses elements [{min}, {max}] outside a buffer of {len} elements")]
    OutOfBounds { min: isize, max: isize, len: usize },

    #[error("unknown dtype: {0}")]
    UnknownDType(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Msg(String),
}

impl Error {
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

