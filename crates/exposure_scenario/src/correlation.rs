//! Factor correlation with Cholesky decomposition.
//!
//! Given independent standard normals `Z`, correlated normals are `W = L Z`
//! where `C = L L^T`.

use exposure_core::ConfigurationError;

const EPSILON: f64 = 1e-10;

/// Validated correlation matrix, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    data: Vec<f64>,
    dim: usize,
}

impl CorrelationMatrix {
    /// Creates a correlation matrix from row-major data.
    ///
    /// # Errors
    /// `ConfigurationError` if the size is not `dim * dim`, the diagonal is not
    /// one, the matrix is not symmetric, or an entry is outside `[-1, 1]`.
    pub fn new(data: &[f64], dim: usize) -> Result<Self, ConfigurationError> {
        if data.len() != dim * dim {
            return Err(ConfigurationError::DimensionMismatch {
                what: "correlation matrix",
                expected: dim * dim,
                got: data.len(),
            });
        }
        for i in 0..dim {
            if (data[i * dim + i] - 1.0).abs() > EPSILON {
                return Err(ConfigurationError::invalid(
                    "correlation",
                    format!("diagonal element {} is {}", i, data[i * dim + i]),
                ));
            }
            for j in (i + 1)..dim {
                let rho = data[i * dim + j];
                if (rho - data[j * dim + i]).abs() > EPSILON {
                    return Err(ConfigurationError::invalid(
                        "correlation",
                        format!("not symmetric at ({}, {})", i, j),
                    ));
                }
                if !(-1.0..=1.0).contains(&rho) {
                    return Err(ConfigurationError::invalid(
                        "correlation",
                        format!("entry ({}, {}) is {}", i, j, rho),
                    ));
                }
            }
        }
        Ok(Self {
            data: data.to_vec(),
            dim,
        })
    }

    /// Creates a matrix from nested rows, as read from configuration.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ConfigurationError> {
        let dim = rows.len();
        let mut data = Vec::with_capacity(dim * dim);
        for row in rows {
            if row.len() != dim {
                return Err(ConfigurationError::DimensionMismatch {
                    what: "correlation row",
                    expected: dim,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(&data, dim)
    }

    /// Identity correlation of dimension `dim`.
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        Self { data, dim }
    }

    /// Matrix dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    /// Lower triangular Cholesky factor.
    ///
    /// # Errors
    /// `ConfigurationError::NotPositiveDefinite` if a pivot is not positive.
    pub fn cholesky(&self) -> Result<CholeskyFactor, ConfigurationError> {
        let n = self.dim;
        let mut lower = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += lower[i * n + k] * lower[j * n + k];
                }
                if i == j {
                    let pivot = self.get(i, i) - sum;
                    if pivot <= 0.0 {
                        return Err(ConfigurationError::NotPositiveDefinite);
                    }
                    lower[i * n + i] = pivot.sqrt();
                } else {
                    lower[i * n + j] = (self.get(i, j) - sum) / lower[j * n + j];
                }
            }
        }

        Ok(CholeskyFactor { data: lower, dim: n })
    }
}

/// Lower triangular factor `L` with `C = L L^T`.
#[derive(Clone, Debug, PartialEq)]
pub struct CholeskyFactor {
    data: Vec<f64>,
    dim: usize,
}

impl CholeskyFactor {
    /// Factor dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Writes `L z` into `out`; both slices must have length `dim`.
    pub fn transform_into(&self, z: &[f64], out: &mut [f64]) {
        let n = self.dim;
        for i in 0..n {
            let row = &self.data[i * n..i * n + i + 1];
            out[i] = row.iter().zip(z).map(|(l, x)| l * x).sum();
        }
    }

    /// Returns `L z`.
    pub fn transform(&self, z: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dim];
        self.transform_into(z, &mut out);
        out
    }
}
