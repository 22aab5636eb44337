// src/plane.rs - Least-squares line fit for offline floor calibration
use crate::locate::Location;
use nalgebra::{Matrix2, Point3, Vector2};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlaneError {
    #[error("need at least two usable samples, got {0}")]
    TooFewSamples(usize),
    #[error("samples share one x value, slope is undefined")]
    Degenerate,
}

/// `y = k·x + b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub k: f64,
    pub b: f64,
}

impl Plane {
    pub fn y_at(&self, x: f64) -> f64 {
        self.k * x + self.b
    }

    /// Fits over the x/y of absolute locations. Samples sitting exactly on
    /// the origin are treated as missing readings and skipped, as are
    /// relative locations.
    pub fn fit(locations: &[Location]) -> Result<Plane, PlaneError> {
        let points: Vec<(f64, f64)> = locations
            .iter()
            .filter_map(|location| match location {
                Location::Absolute(p) if *p != Point3::origin() => Some((p.x, p.y)),
                _ => None,
            })
            .collect();
        Self::fit_points(&points)
    }

    pub fn fit_points(points: &[(f64, f64)]) -> Result<Plane, PlaneError> {
        if points.len() < 2 {
            return Err(PlaneError::TooFewSamples(points.len()));
        }

        // Normal equations: [Σx² Σx; Σx n] [k b]ᵀ = [Σxy Σy]ᵀ
        let n = points.len() as f64;
        let (sxx, sx, sxy, sy) = points.iter().fold((0.0, 0.0, 0.0, 0.0), |(sxx, sx, sxy, sy), &(x, y)| {
            (sxx + x * x, sx + x, sxy + x * y, sy + y)
        });
        let normal = Matrix2::new(sxx, sx, sx, n);
        let rhs = Vector2::new(sxy, sy);

        let det = normal.determinant();
        if det.abs() <= f64::EPSILON * sxx.abs().max(1.0) * n {
            return Err(PlaneError::Degenerate);
        }
        let solution = normal.try_inverse().ok_or(PlaneError::Degenerate)? * rhs;
        Ok(Plane {
            k: solution[0],
            b: solution[1],
        })
    }
}
