//! Polynomial basis systems over a multi-dimensional path state.
//!
//! A basis of order `p` in `d` dimensions contains every product
//! `f_{k1}(x1) ... f_{kd}(xd)` with total degree `k1 + ... + kd <= p`, where
//! `f_k` is the one-dimensional polynomial of degree `k` of the chosen family.

use serde::{Deserialize, Serialize};

/// One-dimensional polynomial family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisFunctionType {
    /// `1, x, x^2, ...`
    #[default]
    Monomial,
    /// Laguerre polynomials `L_k`
    Laguerre,
    /// Probabilists' Hermite polynomials `He_k`
    Hermite,
}

impl BasisFunctionType {
    /// Writes the polynomials of degree `0..out.len()` at `x` into `out`.
    pub fn evaluate_into(&self, x: f64, out: &mut [f64]) {
        if out.is_empty() {
            return;
        }
        out[0] = 1.0;
        if out.len() == 1 {
            return;
        }
        out[1] = match self {
            BasisFunctionType::Monomial | BasisFunctionType::Hermite => x,
            BasisFunctionType::Laguerre => 1.0 - x,
        };
        for k in 1..out.len() - 1 {
            let kf = k as f64;
            out[k + 1] = match self {
                BasisFunctionType::Monomial => out[k] * x,
                BasisFunctionType::Laguerre => {
                    ((2.0 * kf + 1.0 - x) * out[k] - kf * out[k - 1]) / (kf + 1.0)
                }
                BasisFunctionType::Hermite => x * out[k] - kf * out[k - 1],
            };
        }
    }
}

/// Multi-dimensional total-degree basis.
///
/// # Examples
///
/// ```
/// use exposure_amc::{BasisFunctionType, BasisSystem};
///
/// let basis = BasisSystem::new(BasisFunctionType::Monomial, 2, 2);
/// // 1, x, y, x^2, xy, y^2
/// assert_eq!(basis.size(), 6);
///
/// let mut out = vec![0.0; basis.size()];
/// basis.evaluate(&[2.0, 3.0], &mut out);
/// assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BasisSystem {
    kind: BasisFunctionType,
    order: usize,
    dim: usize,
    multi_indices: Vec<Vec<usize>>,
}

impl BasisSystem {
    /// Builds the basis of the given family, order and state dimension.
    pub fn new(kind: BasisFunctionType, order: usize, dim: usize) -> Self {
        let mut multi_indices = Vec::new();
        for degree in 0..=order {
            let mut current = vec![0; dim];
            push_indices_of_degree(degree, 0, &mut current, &mut multi_indices);
        }
        if dim == 0 {
            multi_indices.truncate(1);
        }
        Self {
            kind,
            order,
            dim,
            multi_indices,
        }
    }

    /// Polynomial family.
    #[inline]
    pub fn kind(&self) -> BasisFunctionType {
        self.kind
    }

    /// Maximum total degree.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// State dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of basis functions.
    #[inline]
    pub fn size(&self) -> usize {
        self.multi_indices.len()
    }

    /// Evaluates every basis function at `x` into `out`.
    ///
    /// `x` must have length `dim` and `out` length `size`.
    pub fn evaluate(&self, x: &[f64], out: &mut [f64]) {
        let width = self.order + 1;
        let mut table = vec![0.0; self.dim * width];
        for (j, &xj) in x.iter().enumerate().take(self.dim) {
            self.kind.evaluate_into(xj, &mut table[j * width..(j + 1) * width]);
        }
        for (slot, index) in out.iter_mut().zip(&self.multi_indices) {
            *slot = index
                .iter()
                .enumerate()
                .map(|(j, &k)| table[j * width + k])
                .product();
        }
    }
}

/// Appends all multi-indices with entries from position `pos` summing to `remaining`.
fn push_indices_of_degree(
    remaining: usize,
    pos: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if pos + 1 >= current.len() {
        if let Some(last) = current.last_mut() {
            *last = remaining;
            out.push(current.clone());
        } else if remaining == 0 {
            out.push(Vec::new());
        }
        return;
    }
    for k in (0..=remaining).rev() {
        current[pos] = k;
        push_indices_of_degree(remaining - k, pos + 1, current, out);
    }
    current[pos] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_laguerre_values() {
        let mut out = [0.0; 4];
        BasisFunctionType::Laguerre.evaluate_into(0.5, &mut out);
        assert_relative_eq!(out[1], 0.5);
        // L2 = (x^2 - 4x + 2) / 2
        assert_relative_eq!(out[2], (0.25 - 2.0 + 2.0) / 2.0, epsilon = 1e-14);
        // L3 = (-x^3 + 9x^2 - 18x + 6) / 6
        assert_relative_eq!(
            out[3],
            (-0.125 + 9.0 * 0.25 - 9.0 + 6.0) / 6.0,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_hermite_values() {
        let mut out = [0.0; 4];
        BasisFunctionType::Hermite.evaluate_into(2.0, &mut out);
        // He2 = x^2 - 1, He3 = x^3 - 3x
        assert_eq!(out, [1.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn test_basis_size_is_binomial() {
        // C(order + dim, dim)
        assert_eq!(BasisSystem::new(BasisFunctionType::Monomial, 3, 1).size(), 4);
        assert_eq!(BasisSystem::new(BasisFunctionType::Hermite, 2, 3).size(), 10);
        assert_eq!(BasisSystem::new(BasisFunctionType::Laguerre, 4, 2).size(), 15);
        assert_eq!(BasisSystem::new(BasisFunctionType::Monomial, 0, 2).size(), 1);
    }

    #[test]
    fn test_zero_dimensional_basis_is_constant() {
        let b = BasisSystem::new(BasisFunctionType::Monomial, 3, 0);
        assert_eq!(b.size(), 1);
        let mut out = [0.0];
        b.evaluate(&[], &mut out);
        assert_eq!(out, [1.0]);
    }

    #[test]
    fn test_first_function_is_constant() {
        let b = BasisSystem::new(BasisFunctionType::Laguerre, 2, 2);
        let mut out = vec![0.0; b.size()];
        b.evaluate(&[0.3, -1.2], &mut out);
        assert_eq!(out[0], 1.0);
    }
}
