//! Ising problem instance and energy evaluation.

use rand::Rng;

use crate::error::{AnnealError, Result};

/// A spin value, `+1` or `-1`.
pub type Spin = i8;

/// An Ising problem instance: couplings `J` and external field `h`.
///
/// The Hamiltonian minimized by the annealer is
///
/// ```text
/// E(s) = -Σ_{i<j} J_ij s_i s_j - Σ_i h_i s_i
/// ```
///
/// `J` is symmetric with a zero diagonal. Diagonal entries are never read
/// by [`energy`](Self::energy) or [`energy_delta`](Self::energy_delta).
///
/// # Examples
///
/// ```
/// use u_ising::ising::IsingProblem;
///
/// // Two ferromagnetically coupled spins, no field.
/// let problem = IsingProblem::from_parts(
///     vec![vec![0.0, 1.0], vec![1.0, 0.0]],
///     vec![0.0, 0.0],
/// ).unwrap();
///
/// assert_eq!(problem.energy(&[1, 1]), -1.0);
/// assert_eq!(problem.energy(&[1, -1]), 1.0);
/// assert_eq!(problem.energy_delta(&[1, -1], 0), -2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IsingProblem {
    n: usize,
    /// Row-major `n * n` coupling matrix.
    couplings: Vec<f64>,
    field: Vec<f64>,
}

impl IsingProblem {
    /// Generates a random instance with `J_ij = J_ji` and `h_i` uniform in
    /// `[-1, 1)`.
    ///
    /// The upper triangle of `J` is drawn row by row, then `h`, so a seeded
    /// generator always reproduces the same instance.
    pub fn random<R: Rng>(n: usize, rng: &mut R) -> Result<Self> {
        if n < 2 {
            return Err(AnnealError::invalid(format!(
                "spin_count must be at least 2, got {n}"
            )));
        }

        let mut couplings = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let value = rng.random_range(-1.0..1.0);
                couplings[i * n + j] = value;
                couplings[j * n + i] = value;
            }
        }

        let field = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();

        Ok(Self {
            n,
            couplings,
            field,
        })
    }

    /// Builds an instance from an explicit coupling matrix and field.
    ///
    /// The matrix must be square, symmetric and finite off the diagonal.
    /// Diagonal entries are discarded.
    pub fn from_parts(couplings: Vec<Vec<f64>>, field: Vec<f64>) -> Result<Self> {
        let n = field.len();
        if n < 2 {
            return Err(AnnealError::invalid(format!(
                "spin_count must be at least 2, got {n}"
            )));
        }
        if couplings.len() != n {
            return Err(AnnealError::invalid(format!(
                "coupling matrix has {} rows, field has {n} entries",
                couplings.len()
            )));
        }
        if let Some((i, h)) = field.iter().enumerate().find(|(_, h)| !h.is_finite()) {
            return Err(AnnealError::invalid(format!("field[{i}] is not finite: {h}")));
        }

        let mut flat = vec![0.0; n * n];
        for (i, row) in couplings.iter().enumerate() {
            if row.len() != n {
                return Err(AnnealError::invalid(format!(
                    "coupling row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                if !value.is_finite() {
                    return Err(AnnealError::invalid(format!(
                        "coupling[{i}][{j}] is not finite: {value}"
                    )));
                }
                flat[i * n + j] = value;
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if flat[i * n + j] != flat[j * n + i] {
                    return Err(AnnealError::invalid(format!(
                        "coupling matrix is not symmetric at ({i}, {j}): {} != {}",
                        flat[i * n + j],
                        flat[j * n + i]
                    )));
                }
            }
        }

        Ok(Self {
            n,
            couplings: flat,
            field,
        })
    }

    /// Number of spins.
    pub fn spin_count(&self) -> usize {
        self.n
    }

    /// Coupling strength `J_ij`.
    pub fn coupling(&self, i: usize, j: usize) -> f64 {
        self.couplings[i * self.n + j]
    }

    /// External field vector `h`.
    pub fn field(&self) -> &[f64] {
        &self.field
    }

    /// Coupling matrix as nested rows.
    pub fn coupling_matrix(&self) -> Vec<Vec<f64>> {
        self.couplings.chunks(self.n).map(<[f64]>::to_vec).collect()
    }

    /// Full Hamiltonian of `spins`, O(N²).
    ///
    /// # Panics
    /// Panics if `spins.len()` differs from [`spin_count`](Self::spin_count).
    pub fn energy(&self, spins: &[Spin]) -> f64 {
        assert_eq!(spins.len(), self.n, "spin configuration length mismatch");

        let mut energy = 0.0;
        for i in 0..self.n {
            let row = self.row(i);
            let si = f64::from(spins[i]);
            for j in (i + 1)..self.n {
                energy -= row[j] * si * f64::from(spins[j]);
            }
        }
        for (h, &s) in self.field.iter().zip(spins) {
            energy -= h * f64::from(s);
        }
        energy
    }

    /// Energy change if the spin at `index` were flipped, O(N).
    ///
    /// `ΔE = 2 s_k (Σ_{j≠k} J_kj s_j + h_k)`
    ///
    /// # Panics
    /// Panics if `index` is out of range or `spins` has the wrong length.
    pub fn energy_delta(&self, spins: &[Spin], index: usize) -> f64 {
        assert_eq!(spins.len(), self.n, "spin configuration length mismatch");

        let row = self.row(index);
        let local: f64 = row[..index]
            .iter()
            .zip(&spins[..index])
            .chain(row[index + 1..].iter().zip(&spins[index + 1..]))
            .map(|(j, &s)| j * f64::from(s))
            .sum();

        2.0 * f64::from(spins[index]) * (local + self.field[index])
    }

    #[inline]
    fn row(&self, i: usize) -> &[f64] {
        &self.couplings[i * self.n..(i + 1) * self.n]
    }
}

/// Draws a uniform ±1 configuration.
pub(crate) fn random_spins<R: Rng>(n: usize, rng: &mut R) -> Vec<Spin> {
    (0..n)
        .map(|_| if rng.random_bool(0.5) { 1 } else { -1 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use u_numflow::random::create_rng;

    fn flipped(spins: &[Spin], index: usize) -> Vec<Spin> {
        let mut out = spins.to_vec();
        out[index] = -out[index];
        out
    }

    #[test]
    fn test_random_is_symmetric_with_zero_diagonal() {
        let mut rng = create_rng(42);
        let problem = IsingProblem::random(12, &mut rng).unwrap();

        for i in 0..12 {
            assert_eq!(problem.coupling(i, i), 0.0);
            for j in 0..12 {
                assert_eq!(problem.coupling(i, j), problem.coupling(j, i));
                assert!((-1.0..1.0).contains(&problem.coupling(i, j)));
            }
        }
        assert!(problem.field().iter().all(|h| (-1.0..1.0).contains(h)));
    }

    #[test]
    fn test_random_reproducible_with_seed() {
        let a = IsingProblem::random(8, &mut create_rng(3)).unwrap();
        let b = IsingProblem::random(8, &mut create_rng(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_rejects_single_spin() {
        assert!(IsingProblem::random(1, &mut create_rng(0)).is_err());
    }

    #[test]
    fn test_from_parts_discards_diagonal() {
        let problem = IsingProblem::from_parts(
            vec![vec![5.0, 0.5], vec![0.5, -3.0]],
            vec![0.1, 0.2],
        )
        .unwrap();
        assert_eq!(problem.coupling(0, 0), 0.0);
        assert_eq!(problem.coupling(1, 1), 0.0);
        assert_eq!(problem.coupling(0, 1), 0.5);
    }

    #[test]
    fn test_from_parts_rejects_bad_input() {
        // Asymmetric.
        assert!(IsingProblem::from_parts(vec![vec![0.0, 1.0], vec![0.5, 0.0]], vec![0.0; 2]).is_err());
        // Ragged.
        assert!(IsingProblem::from_parts(vec![vec![0.0, 1.0], vec![1.0]], vec![0.0; 2]).is_err());
        // Row count mismatch.
        assert!(IsingProblem::from_parts(vec![vec![0.0, 1.0]], vec![0.0; 2]).is_err());
        // Non-finite.
        assert!(IsingProblem::from_parts(
            vec![vec![0.0, f64::NAN], vec![f64::NAN, 0.0]],
            vec![0.0; 2]
        )
        .is_err());
        assert!(IsingProblem::from_parts(
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            vec![f64::INFINITY, 0.0]
        )
        .is_err());
        // Too small.
        assert!(IsingProblem::from_parts(vec![vec![0.0]], vec![0.0]).is_err());
    }

    #[test]
    fn test_energy_two_spins() {
        let problem =
            IsingProblem::from_parts(vec![vec![0.0, 1.0], vec![1.0, 0.0]], vec![0.0, 0.0]).unwrap();
        assert_eq!(problem.energy(&[1, 1]), -1.0);
        assert_eq!(problem.energy(&[-1, -1]), -1.0);
        assert_eq!(problem.energy(&[1, -1]), 1.0);
    }

    #[test]
    fn test_energy_field_term() {
        let problem =
            IsingProblem::from_parts(vec![vec![0.0, 0.0], vec![0.0, 0.0]], vec![0.5, -2.0]).unwrap();
        assert_eq!(problem.energy(&[1, 1]), -0.5 + 2.0);
        assert_eq!(problem.energy(&[1, -1]), -0.5 - 2.0);
    }

    #[test]
    fn test_energy_is_idempotent() {
        let mut rng = create_rng(11);
        let problem = IsingProblem::random(20, &mut rng).unwrap();
        let spins = random_spins(20, &mut rng);
        assert_eq!(problem.energy(&spins), problem.energy(&spins));
    }

    #[test]
    fn test_diagonal_never_consulted() {
        let mut rng = create_rng(5);
        let problem = IsingProblem::random(6, &mut rng).unwrap();
        let spins = random_spins(6, &mut rng);

        let mut poisoned = problem.clone();
        for i in 0..6 {
            poisoned.couplings[i * 6 + i] = f64::NAN;
        }

        assert_eq!(problem.energy(&spins), poisoned.energy(&spins));
        for i in 0..6 {
            assert_eq!(problem.energy_delta(&spins, i), poisoned.energy_delta(&spins, i));
        }
    }

    proptest! {
        #[test]
        fn prop_delta_matches_full_recomputation(n in 2usize..=50, seed in any::<u64>()) {
            let mut rng = create_rng(seed);
            let problem = IsingProblem::random(n, &mut rng).unwrap();
            let spins = random_spins(n, &mut rng);
            let base = problem.energy(&spins);

            for i in 0..n {
                let expected = problem.energy(&flipped(&spins, i)) - base;
                let delta = problem.energy_delta(&spins, i);
                prop_assert!(
                    (delta - expected).abs() < 1e-9,
                    "index {}: delta {} vs recomputed {}", i, delta, expected
                );
            }
        }

        #[test]
        fn prop_random_couplings_symmetric(n in 2usize..=30, seed in any::<u64>()) {
            let problem = IsingProblem::random(n, &mut create_rng(seed)).unwrap();
            for i in 0..n {
                for j in 0..n {
                    prop_assert_eq!(problem.coupling(i, j), problem.coupling(j, i));
                }
            }
        }
    }
}
