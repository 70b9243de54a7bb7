//! # Correlation
//!
//! $$
//! \rho(d) = \begin{cases} 1 & d = 0 \\ (1 - \nu_0)\, \rho_s(d / a) & d > 0 \end{cases}
//! $$
//!
//! Isotropic correlograms in the effective-range convention: the structured
//! part $\rho_s$ reaches zero (Spherical) or roughly 0.05 (the others) at
//! $d = a$; $\nu_0$ is the nugget fraction.
use std::fmt;

use crate::error::ConstructionError;

/// Scale factor putting the Matérn 3/2 correlation at 0.05 for `d = range`.
const MATERN_3_2_SCALE: f64 = 4.743_864_518_390_579;
/// Scale factor putting the Matérn 5/2 correlation at 0.05 for `d = range`.
const MATERN_5_2_SCALE: f64 = 5.918_649_346_310_188;

/// Matérn smoothness values with closed-form correlation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaternSmoothness {
  /// ν = 1/2, identical to the exponential model and coregionalizable with it.
  Half,
  /// ν = 3/2, once mean-square differentiable.
  ThreeHalves,
  /// ν = 5/2, twice mean-square differentiable.
  FiveHalves,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelogramFamily {
  Spherical,
  Exponential,
  Gaussian,
  Matern(MaternSmoothness),
}

impl fmt::Display for CorrelogramFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Spherical => write!(f, "Sph"),
      Self::Exponential => write!(f, "Exp"),
      Self::Gaussian => write!(f, "Gau"),
      Self::Matern(MaternSmoothness::Half) => write!(f, "Mat(0.5)"),
      Self::Matern(MaternSmoothness::ThreeHalves) => write!(f, "Mat(1.5)"),
      Self::Matern(MaternSmoothness::FiveHalves) => write!(f, "Mat(2.5)"),
    }
  }
}

/// One spatial correlogram: family, effective range and nugget fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationModel {
  family: CorrelogramFamily,
  range: f64,
  nugget_fraction: f64,
}

impl CorrelationModel {
  pub fn new(
    family: CorrelogramFamily,
    range: f64,
    nugget_fraction: f64,
  ) -> Result<Self, ConstructionError> {
    if !(range.is_finite() && range > 0.0) {
      return Err(ConstructionError::invalid(
        "range",
        format!("must be positive and finite, got {range}"),
      ));
    }
    if !(0.0..1.0).contains(&nugget_fraction) {
      return Err(ConstructionError::invalid(
        "nugget_fraction",
        format!("must lie in [0, 1), got {nugget_fraction}"),
      ));
    }

    Ok(Self {
      family,
      range,
      nugget_fraction,
    })
  }

  pub fn spherical(range: f64, nugget_fraction: f64) -> Result<Self, ConstructionError> {
    Self::new(CorrelogramFamily::Spherical, range, nugget_fraction)
  }

  pub fn exponential(range: f64, nugget_fraction: f64) -> Result<Self, ConstructionError> {
    Self::new(CorrelogramFamily::Exponential, range, nugget_fraction)
  }

  pub fn gaussian(range: f64, nugget_fraction: f64) -> Result<Self, ConstructionError> {
    Self::new(CorrelogramFamily::Gaussian, range, nugget_fraction)
  }

  pub fn matern(
    smoothness: MaternSmoothness,
    range: f64,
    nugget_fraction: f64,
  ) -> Result<Self, ConstructionError> {
    Self::new(CorrelogramFamily::Matern(smoothness), range, nugget_fraction)
  }

  pub fn family(&self) -> CorrelogramFamily {
    self.family
  }

  pub fn range(&self) -> f64 {
    self.range
  }

  pub fn nugget_fraction(&self) -> f64 {
    self.nugget_fraction
  }

  /// Correlation approached as the lag tends to zero from above.
  pub fn acf0(&self) -> f64 {
    1.0 - self.nugget_fraction
  }

  /// The same family and range without a nugget.
  pub fn without_nugget(&self) -> Self {
    Self {
      nugget_fraction: 0.0,
      ..*self
    }
  }

  /// Correlation between two locations `distance` apart.
  #[inline]
  pub fn correlation(&self, distance: f64) -> f64 {
    let d = distance.abs();
    if d == 0.0 {
      1.0
    } else {
      self.acf0() * self.structure(d)
    }
  }

  /// Nugget-free structured correlation, equal to 1 at the origin.
  #[inline]
  pub fn structure(&self, distance: f64) -> f64 {
    let h = distance.abs() / self.range;
    match self.family {
      CorrelogramFamily::Spherical => {
        if h < 1.0 {
          1.0 - 1.5 * h + 0.5 * h * h * h
        } else {
          0.0
        }
      }
      CorrelogramFamily::Exponential | CorrelogramFamily::Matern(MaternSmoothness::Half) => {
        (-3.0 * h).exp()
      }
      CorrelogramFamily::Gaussian => (-3.0 * h * h).exp(),
      CorrelogramFamily::Matern(MaternSmoothness::ThreeHalves) => {
        let x = MATERN_3_2_SCALE * h;
        (1.0 + x) * (-x).exp()
      }
      CorrelogramFamily::Matern(MaternSmoothness::FiveHalves) => {
        let x = MATERN_5_2_SCALE * h;
        (1.0 + x + x * x / 3.0) * (-x).exp()
      }
    }
  }

  /// Semivariogram of the standardized field, `1 - correlation(d)`.
  #[inline]
  pub fn semivariance(&self, distance: f64) -> f64 {
    1.0 - self.correlation(distance)
  }

  /// Variables may share a coregionalization when family and range agree;
  /// nugget fractions are free to differ.
  pub fn is_coregionalizable_with(&self, other: &CorrelationModel) -> bool {
    self.structural_family() == other.structural_family() && self.range == other.range
  }

  /// `Matern(Half)` and `Exponential` share one structure function.
  fn structural_family(&self) -> CorrelogramFamily {
    match self.family {
      CorrelogramFamily::Matern(MaternSmoothness::Half) => CorrelogramFamily::Exponential,
      family => family,
    }
  }
}

impl fmt::Display for CorrelationModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}(range={}, nugget={})",
      self.family, self.range, self.nugget_fraction
    )
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn all_families() -> Vec<CorrelogramFamily> {
    vec![
      CorrelogramFamily::Spherical,
      CorrelogramFamily::Exponential,
      CorrelogramFamily::Gaussian,
      CorrelogramFamily::Matern(MaternSmoothness::Half),
      CorrelogramFamily::Matern(MaternSmoothness::ThreeHalves),
      CorrelogramFamily::Matern(MaternSmoothness::FiveHalves),
    ]
  }

  #[test]
  fn rejects_invalid_parameters() {
    assert!(matches!(
      CorrelationModel::spherical(0.0, 0.0),
      Err(ConstructionError::InvalidParameter { name: "range", .. })
    ));
    assert!(CorrelationModel::spherical(-3.0, 0.0).is_err());
    assert!(CorrelationModel::spherical(f64::INFINITY, 0.0).is_err());
    assert!(matches!(
      CorrelationModel::spherical(5.0, 1.0),
      Err(ConstructionError::InvalidParameter {
        name: "nugget_fraction",
        ..
      })
    ));
    assert!(CorrelationModel::spherical(5.0, -0.1).is_err());
    assert!(CorrelationModel::spherical(5.0, 0.999).is_ok());
  }

  #[test]
  fn unit_at_origin_and_non_increasing_for_every_family() {
    for family in all_families() {
      for &nugget in &[0.0, 0.3, 0.9] {
        let model = CorrelationModel::new(family, 7.5, nugget).unwrap();
        assert_eq!(model.correlation(0.0), 1.0);
        let mut prev = model.correlation(0.0);
        for i in 1..400 {
          let d = i as f64 * 0.05;
          let c = model.correlation(d);
          assert!(
            c <= prev + 1e-15,
            "{family} not monotone at d={d}: {c} > {prev}"
          );
          assert!(c >= 0.0);
          prev = c;
        }
      }
    }
  }

  #[test]
  fn nugget_creates_discontinuity_at_origin() {
    let model = CorrelationModel::exponential(10.0, 0.4).unwrap();
    assert_eq!(model.correlation(0.0), 1.0);
    assert_abs_diff_eq!(model.correlation(1e-9), 0.6, epsilon = 1e-8);
    assert_abs_diff_eq!(model.acf0(), 0.6);
  }

  #[test]
  fn spherical_matches_closed_form() {
    let model = CorrelationModel::spherical(5.0, 0.0).unwrap();
    assert_abs_diff_eq!(model.correlation(2.0), 1.0 - 0.6 + 0.5 * 0.064, epsilon = 1e-12);
    assert_eq!(model.correlation(5.0), 0.0);
    assert_eq!(model.correlation(50.0), 0.0);

    let nuggeted = CorrelationModel::spherical(5.0, 0.25).unwrap();
    assert_abs_diff_eq!(nuggeted.correlation(2.0), 0.75 * 0.432, epsilon = 1e-12);
  }

  #[test]
  fn effective_range_convention() {
    for family in all_families().into_iter().skip(1) {
      let model = CorrelationModel::new(family, 100.0, 0.0).unwrap();
      let at_range = model.correlation(100.0);
      assert!(
        (at_range - 0.05).abs() < 2e-3,
        "{family} correlation at range: {at_range}"
      );
    }
  }

  #[test]
  fn semivariance_complements_correlation() {
    let model = CorrelationModel::gaussian(3.0, 0.2).unwrap();
    assert_eq!(model.semivariance(0.0), 0.0);
    assert_abs_diff_eq!(model.semivariance(1.5) + model.correlation(1.5), 1.0);
  }

  #[test]
  fn coregionalization_ignores_nugget() {
    let a = CorrelationModel::spherical(5000.0, 0.4).unwrap();
    let b = CorrelationModel::spherical(5000.0, 0.6).unwrap();
    let c = CorrelationModel::exponential(5000.0, 0.4).unwrap();
    let d = CorrelationModel::spherical(4000.0, 0.4).unwrap();
    assert!(a.is_coregionalizable_with(&b));
    assert!(!a.is_coregionalizable_with(&c));
    assert!(!a.is_coregionalizable_with(&d));
    assert_eq!(a.without_nugget().nugget_fraction(), 0.0);
    assert_eq!(a.without_nugget().range(), 5000.0);
  }

  #[test]
  fn matern_half_coregionalizes_with_exponential() {
    let exp = CorrelationModel::exponential(300.0, 0.2).unwrap();
    let half = CorrelationModel::matern(MaternSmoothness::Half, 300.0, 0.0).unwrap();
    let three_halves = CorrelationModel::matern(MaternSmoothness::ThreeHalves, 300.0, 0.0).unwrap();
    assert!(exp.is_coregionalizable_with(&half));
    assert!(half.is_coregionalizable_with(&exp));
    assert!(!half.is_coregionalizable_with(&three_halves));
    assert_eq!(exp.without_nugget().correlation(120.0), half.correlation(120.0));
  }
}
