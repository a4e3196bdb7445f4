use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// DType — element type tag of a foreign array
//
// Descriptors are untyped at runtime: the element type is a tag compared by
// equality, exactly like the device. The set mirrors what array producers
// commonly hand across a boundary (signed/unsigned integers of every width,
// IEEE floats and bfloat16). Booleans and complex numbers are not described.

/// Element data type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    BF16,
    F32,
    F64,
}

/// Broad category of a dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DTypeKind {
    Int,
    UInt,
    Float,
    BFloat,
}

impl DType {
    pub const ALL: [DType; 12] = [
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
    ];

    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.bits() / 8
    }

    pub fn bits(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 8,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::U64 | DType::F64 => 64,
        }
    }

    pub fn kind(&self) -> DTypeKind {
        match self {
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => DTypeKind::Int,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => DTypeKind::UInt,
            DType::F16 | DType::F32 | DType::F64 => DTypeKind::Float,
            DType::BF16 => DTypeKind::BFloat,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind(), DTypeKind::Float | DTypeKind::BFloat)
    }

    /// The numpy-style name, e.g. `float32`.
    pub fn name(&self) -> &'static str {
        match self {
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    /// Accepts both the long numpy names and the short Rust-style ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s {
            "i8" | "int8" => DType::I8,
            "i16" | "int16" => DType::I16,
            "i32" | "int32" => DType::I32,
            "i64" | "int64" => DType::I64,
            "u8" | "uint8" => DType::U8,
            "u16" | "uint16" => DType::U16,
            "u32" | "uint32" => DType::U32,
            "u64" | "uint64" => DType::U64,
            "f16" | "float16" | "half" => DType::F16,
            "bf16" | "bfloat16" => DType::BF16,
            "f32" | "float32" | "float" => DType::F32,
            "f64" | "float64" | "double" => DType::F64,
            other => return Err(Error::UnknownDType(other.to_string())),
        };
        Ok(dtype)
    }
}

// Element — bridge between Rust types and the runtime tag
//
// A typed view `View<T, N>` can only be derived when `T::DTYPE` equals the
// descriptor's tag, so this impl list is the complete set of element types a
// caller may project an array onto.

/// A Rust type that can be the element of a described array.
pub trait Element: Copy + Send + Sync + 'static + fmt::Debug + num_traits::Zero {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    half::f16 => F16,
    half::bf16 => BF16,
    f32 => F32,
    f64 => F64,
}
