//! Linear solves for the implicit steppers: LU factorization with partial
//! pivoting of a dense row-major matrix, factored once per step and reused
//! across Newton iterations.

use crate::Float;

/// LU factors of a dense row-major `n x n` matrix.
pub struct LuFactors {
    lu: Vec<Float>,
    piv: Vec<usize>,
    n: usize,
}

impl LuFactors {
    /// Factor `a` (consumed, row-major). Returns `None` when a zero pivot
    /// makes the matrix singular.
    pub fn factor(mut a: Vec<Float>, n: usize) -> Option<Self> {
        debug_assert_eq!(a.len(), n * n);
        let mut piv = vec![0; n];
        for k in 0..n {
            // pivot
            let mut pivot_row = k;
            let mut pivot_val = a[k * n + k].abs();
            for i in (k + 1)..n {
                let val = a[i * n + k].abs();
                if val > pivot_val {
                    pivot_val = val;
                    pivot_row = i;
                }
            }
            if pivot_val == 0.0 {
                return None;
            }
            piv[k] = pivot_row;
            if pivot_row != k {
                for j in 0..n {
                    a.swap(k * n + j, pivot_row * n + j);
                }
            }
            // Eliminate below the pivot
            let akk = a[k * n + k];
            for i in (k + 1)..n {
                let factor = a[i * n + k] / akk;
                a[i * n + k] = factor;
                for j in (k + 1)..n {
                    a[i * n + j] -= factor * a[k * n + j];
                }
            }
        }
        Some(Self { lu: a, piv, n })
    }

    /// Solve `A x = b` in place: `b` is overwritten with `x`.
    pub fn solve(&self, b: &mut [Float]) {
        let n = self.n;
        debug_assert_eq!(b.len(), n);
        // Apply row permutations
        for k in 0..n {
            if self.piv[k] != k {
                b.swap(k, self.piv[k]);
            }
        }
        // Forward solve Ly = Pb
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= self.lu[i * n + k] * b[k];
            }
            b[i] = sum;
        }
        // Backward solve Ux = y
        for i in (0..n).rev() {
            let mut sum = b[i];
            for k in (i + 1)..n {
                sum -= self.lu[i * n + k] * b[k];
            }
            b[i] = sum / self.lu[i * n + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_2x2() {
        // A = [[3, 2],[1, 4]], b = [5, 6] -> x = [0.8, 1.3]
        let lu = LuFactors::factor(vec![3.0, 2.0, 1.0, 4.0], 2).unwrap();
        let mut b = vec![5.0, 6.0];
        lu.solve(&mut b);
        assert!((b[0] - 0.8).abs() < 1e-12);
        assert!((b[1] - 1.3).abs() < 1e-12);
    }

    #[test]
    fn solve_3x3_with_pivoting_reused() {
        // First pivot is zero, forcing a row swap.
        let a = vec![0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0];
        let lu = LuFactors::factor(a.clone(), 3).unwrap();
        for x_ref in [[1.0, -2.0, 3.0], [0.5, 0.0, -1.5]] {
            let mut b = vec![0.0; 3];
            for i in 0..3 {
                for j in 0..3 {
                    b[i] += a[i * 3 + j] * x_ref[j];
                }
            }
            lu.solve(&mut b);
            for i in 0..3 {
                assert!((b[i] - x_ref[i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn singular_matrix_reports_failure() {
        assert!(LuFactors::factor(vec![1.0, 2.0, 2.0, 4.0], 2).is_none());
    }
}
