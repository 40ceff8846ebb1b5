//! Random block construction.
//!
//! This module provides functions for creating blocks with random values.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::range::Range;
use crate::scalar::{Scalar, c64};
use crate::tensor::Tensor;

/// Trait for types that can be randomly sampled from a uniform distribution.
pub trait RandomUniform: Scalar {
    /// Sample a random value from the uniform distribution [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;
}

impl RandomUniform for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }
}

impl RandomUniform for f32 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }
}

impl RandomUniform for c64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        c64::new(rng.sample(StandardUniform), rng.sample(StandardUniform))
    }
}

/// Trait for types that can be randomly sampled from a normal distribution.
pub trait RandomNormal: Scalar {
    /// Sample a random value from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomNormal for f64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomNormal for c64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        // real and imaginary parts are N(0, 1/2) so that |z|^2 has mean 1
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

impl<T: RandomUniform> Tensor<T> {
    /// Block with uniform random values in [0, 1).
    pub fn random(range: Range) -> Self {
        Self::random_with_rng(range, &mut rand::rng())
    }

    /// Block with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use tiledtensors::{Range, Tensor};
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let range = Range::from_extent(&[2, 3]);
    /// let t1: Tensor<f64> = Tensor::random_with_rng(range.clone(), &mut StdRng::seed_from_u64(42));
    /// let t2: Tensor<f64> = Tensor::random_with_rng(range, &mut StdRng::seed_from_u64(42));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng>(range: Range, rng: &mut R) -> Self {
        Self::from_fn(range, |_| T::sample_uniform(rng))
    }
}

impl<T: RandomNormal> Tensor<T> {
    /// Block with standard normal random values.
    pub fn randn(range: Range) -> Self {
        Self::randn_with_rng(range, &mut rand::rng())
    }

    pub fn randn_with_rng<R: Rng>(range: Range, rng: &mut R) -> Self {
        Self::from_fn(range, |_| T::sample_normal(rng))
    }
}
