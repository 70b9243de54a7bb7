//! # Marginal
//!
//! $$
//! x = F^{-1}_{m, s}\big(\Phi(z)\big), \qquad z \sim \mathcal N(0, 1)
//! $$
//!
//! Transforms from a standard-normal score to the target marginal of one cell,
//! parameterised by that cell's mean `m` and standard deviation `s`.
use std::f64::consts::FRAC_1_SQRT_2;

use statrs::function::erf::erfc;

use crate::error::ConstructionError;

/// Closed set of supported marginal families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Marginal {
  #[default]
  Normal,
  /// Moment-matched lognormal; requires a positive mean wherever `s > 0`.
  LogNormal,
  /// Uniform on `m ± s√3`.
  Uniform,
}

impl Marginal {
  /// Maps a standard-normal score `z` to a value with mean `mean` and
  /// standard deviation `sd`.
  #[inline]
  pub fn transform(&self, z: f64, mean: f64, sd: f64) -> f64 {
    if sd == 0.0 {
      return mean;
    }

    match self {
      Self::Normal => mean + sd * z,
      Self::LogNormal => {
        let (mu, sigma) = lognormal_params(mean, sd);
        (mu + sigma * z).exp()
      }
      Self::Uniform => mean + sd * 3f64.sqrt() * (2.0 * std_normal_cdf(z) - 1.0),
    }
  }

  /// Checks that `(mean, sd)` can parameterise this family.
  pub fn validate(&self, mean: f64, sd: f64) -> Result<(), ConstructionError> {
    if !sd.is_finite() || sd < 0.0 {
      return Err(ConstructionError::invalid(
        "sd",
        format!("must be finite and non-negative, got {sd}"),
      ));
    }
    if !mean.is_finite() {
      return Err(ConstructionError::invalid(
        "mean",
        format!("must be finite, got {mean}"),
      ));
    }
    if *self == Self::LogNormal && sd > 0.0 && mean <= 0.0 {
      return Err(ConstructionError::invalid(
        "mean",
        format!("lognormal marginal needs a positive mean, got {mean}"),
      ));
    }
    Ok(())
  }
}

/// Log-space location and scale matching the first two moments.
fn lognormal_params(mean: f64, sd: f64) -> (f64, f64) {
  let cv2 = (sd / mean).powi(2);
  let sigma2 = cv2.ln_1p();
  (mean.ln() - 0.5 * sigma2, sigma2.sqrt())
}

#[inline]
fn std_normal_cdf(z: f64) -> f64 {
  0.5 * erfc(-z * FRAC_1_SQRT_2)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;
  use rand_pcg::Pcg64;

  use super::*;

  fn moments(marginal: Marginal, mean: f64, sd: f64, n: usize) -> (f64, f64) {
    let mut rng = Pcg64::seed_from_u64(17);
    let xs: Vec<f64> = (0..n)
      .map(|_| {
        let z: f64 = StandardNormal.sample(&mut rng);
        marginal.transform(z, mean, sd)
      })
      .collect();
    let m = xs.iter().sum::<f64>() / n as f64;
    let v = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    (m, v.sqrt())
  }

  #[test]
  fn zero_sd_returns_mean() {
    for marginal in [Marginal::Normal, Marginal::LogNormal, Marginal::Uniform] {
      assert_eq!(marginal.transform(1.7, 3.0, 0.0), 3.0);
    }
  }

  #[test]
  fn normal_is_affine() {
    assert_eq!(Marginal::Normal.transform(-1.5, 2.0, 0.4), 2.0 - 0.6);
  }

  #[test]
  fn lognormal_matches_moments() {
    let (m, s) = moments(Marginal::LogNormal, 2.0, 0.5, 200_000);
    assert!((m - 2.0).abs() < 0.01, "lognormal mean: emp={m}, theory=2.0");
    assert!((s - 0.5).abs() < 0.01, "lognormal sd: emp={s}, theory=0.5");
  }

  #[test]
  fn uniform_matches_moments_and_bounds() {
    let (m, s) = moments(Marginal::Uniform, 10.0, 2.0, 200_000);
    assert!((m - 10.0).abs() < 0.02, "uniform mean: emp={m}, theory=10");
    assert!((s - 2.0).abs() < 0.02, "uniform sd: emp={s}, theory=2");

    let half_width = 2.0 * 3f64.sqrt();
    assert!(Marginal::Uniform.transform(9.0, 10.0, 2.0) <= 10.0 + half_width);
    assert!(Marginal::Uniform.transform(-9.0, 10.0, 2.0) >= 10.0 - half_width);
    assert_abs_diff_eq!(Marginal::Uniform.transform(0.0, 10.0, 2.0), 10.0, epsilon = 1e-12);
  }

  #[test]
  fn validate_rejects_bad_parameters() {
    assert!(Marginal::Normal.validate(0.0, -1.0).is_err());
    assert!(Marginal::Normal.validate(f64::NAN, 1.0).is_err());
    assert!(Marginal::Normal.validate(-3.0, 1.0).is_ok());
    assert!(Marginal::LogNormal.validate(-3.0, 1.0).is_err());
    assert!(Marginal::LogNormal.validate(-3.0, 0.0).is_ok());
    assert!(Marginal::LogNormal.validate(3.0, 1.0).is_ok());
  }
}
