//! Element and scalar traits for tile data.
//!
//! [`Element`] is the minimal bound needed to store and ship a value between
//! ranks. [`Scalar`] adds the arithmetic used by tile kernels and wraps faer's
//! `ComplexField` so that the same types can go through faer's GEMM.

use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

use faer_traits::ComplexField;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use faer::c64;

/// Any value that can live in a tile and travel over the wire.
pub trait Element:
    Copy + Debug + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Element for T where
    T: Copy + Debug + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Trait for scalar types supported by tile arithmetic.
pub trait Scalar:
    Element
    + ComplexField
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    /// The real type associated with this scalar.
    type Real: RealScalar;

    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Complex conjugate; identity for real types.
    fn conjugate(self) -> Self;

    /// `|x|^2`.
    fn abs_sqr(self) -> <Self as Scalar>::Real;

    /// `|x|`.
    fn modulus(self) -> <Self as Scalar>::Real;

    /// Embed a real value.
    fn from_real(re: <Self as Scalar>::Real) -> Self;
}

/// Real scalars, ordered and with a square root.
pub trait RealScalar: Scalar<Real = Self> + PartialOrd {
    fn sqrt_real(self) -> Self;

    /// Lossy conversion used for shape magnitudes.
    fn to_f32(self) -> f32;

    fn from_f64(value: f64) -> Self;
}

/// Shorthand for the real type of a scalar.
pub type RealOf<T> = <T as Scalar>::Real;

impl Scalar for f64 {
    type Real = f64;

    fn one() -> Self {
        1.0
    }

    fn conjugate(self) -> Self {
        self
    }

    fn abs_sqr(self) -> f64 {
        self * self
    }

    fn modulus(self) -> f64 {
        self.abs()
    }

    fn from_real(re: f64) -> Self {
        re
    }
}

impl RealScalar for f64 {
    fn sqrt_real(self) -> Self {
        self.sqrt()
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Scalar for f32 {
    type Real = f32;

    fn one() -> Self {
        1.0
    }

    fn conjugate(self) -> Self {
        self
    }

    fn abs_sqr(self) -> f32 {
        self * self
    }

    fn modulus(self) -> f32 {
        self.abs()
    }

    fn from_real(re: f32) -> Self {
        re
    }
}

impl RealScalar for f32 {
    fn sqrt_real(self) -> Self {
        self.sqrt()
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Scalar for c64 {
    type Real = f64;

    fn one() -> Self {
        c64::new(1.0, 0.0)
    }

    fn conjugate(self) -> Self {
        c64::new(self.re, -self.im)
    }

    fn abs_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn modulus(self) -> f64 {
        self.re.hypot(self.im)
    }

    fn from_real(re: f64) -> Self {
        c64::new(re, 0.0)
    }
}
