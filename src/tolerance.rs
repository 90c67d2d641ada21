//! Tolerance abstraction to allow scalar or vector tolerances

use std::ops::{Index, IndexMut};

use crate::Float;

/// Tolerance enum to allow scalar or vector tolerances
/// using [`Into`] trait for easy conversion from `Float`, `[Float; N]`, or `Vec<Float>`
/// users do not need to know or worry this simply allows both
/// `Float` and `[Float; N]` to be passed in as arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Tolerance {
    Scalar(Float),
    Vector(Vec<Float>),
}

impl Tolerance {
    /// Smallest component, used for validation.
    pub fn min_component(&self) -> Float {
        match self {
            Tolerance::Scalar(v) => *v,
            Tolerance::Vector(vs) => vs.iter().copied().fold(Float::INFINITY, Float::min),
        }
    }
}

impl From<Float> for Tolerance {
    fn from(val: Float) -> Self {
        Tolerance::Scalar(val)
    }
}

impl From<&[Float]> for Tolerance {
    fn from(val: &[Float]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl<const N: usize> From<[Float; N]> for Tolerance {
    fn from(val: [Float; N]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl From<Vec<Float>> for Tolerance {
    fn from(val: Vec<Float>) -> Self {
        Tolerance::Vector(val)
    }
}

impl Index<usize> for Tolerance {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            Tolerance::Scalar(v) => v,
            Tolerance::Vector(vs) => &vs[index],
        }
    }
}

impl IndexMut<usize> for Tolerance {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match self {
            Tolerance::Scalar(v) => v,
            Tolerance::Vector(vs) => &mut vs[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_indexes_everywhere() {
        let tol: Tolerance = 1e-8.into();
        assert_eq!(tol[0], 1e-8);
        assert_eq!(tol[17], 1e-8);
    }

    #[test]
    fn vector_indexes_per_component() {
        let tol: Tolerance = [1e-6, 1e-9].into();
        assert_eq!(tol[0], 1e-6);
        assert_eq!(tol[1], 1e-9);
        assert_eq!(tol.min_component(), 1e-9);
    }
}
