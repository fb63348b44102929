//! Resizing a drawn figure so that its printed size matches a map scale.
//!
//! At scale 1:S one centimetre on paper stands for S centimetres on the
//! ground. The axes box of the drawn figure is measured, compared with the
//! size the ground extent should have on paper, and the whole figure is
//! resized by the ratio of the two.

use log::info;

use crate::error::{Result, TopoError};
use crate::figure::Figure;

pub const CM_PER_INCH: f64 = 2.54;
pub const CM_PER_METRE: f64 = 100.0;

/// Measurements taken while fitting a figure to a scale, per axis
/// (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFit {
    /// Axes box size on paper before fitting, in centimetres.
    pub current_cm: (f64, f64),
    /// Ground extent shown by the axes, in centimetres.
    pub ground_cm: (f64, f64),
    /// Axes box size the requested scale calls for, in centimetres.
    pub target_cm: (f64, f64),
    /// `target_cm / current_cm`.
    pub ratio: (f64, f64),
}

impl ScaleFit {
    /// Scale of the figure before fitting, as paper length over ground length.
    pub fn initial_scale(&self) -> (f64, f64) {
        (
            self.current_cm.0 / self.ground_cm.0,
            self.current_cm.1 / self.ground_cm.1,
        )
    }
}

/// Ratio by which a rendered length of `current_cm` must grow so that it
/// shows `ground_m` metres at scale 1:`denominator`.
pub fn resize_ratio(current_cm: f64, ground_m: f64, denominator: f64) -> f64 {
    (ground_m * CM_PER_METRE / denominator) / current_cm
}

fn check_denominator(denominator: f64) -> Result<()> {
    if denominator.is_finite() && denominator > 0.0 {
        Ok(())
    } else {
        Err(TopoError::invalid(
            "scale",
            denominator,
            "must be a positive number",
        ))
    }
}

/// Measures `figure` against scale 1:`denominator` without changing it.
pub fn measure(figure: &Figure, denominator: f64) -> Result<ScaleFit> {
    check_denominator(denominator)?;
    let axes = figure.axes_box();
    let current_cm = (axes.width * CM_PER_INCH, axes.height * CM_PER_INCH);
    let ground_cm = (
        figure.limits.width() * CM_PER_METRE,
        figure.limits.height() * CM_PER_METRE,
    );
    let target_cm = (ground_cm.0 / denominator, ground_cm.1 / denominator);
    let ratio = (
        resize_ratio(current_cm.0, figure.limits.width(), denominator),
        resize_ratio(current_cm.1, figure.limits.height(), denominator),
    );
    Ok(ScaleFit {
        current_cm,
        ground_cm,
        target_cm,
        ratio,
    })
}

/// Returns a copy of `figure` resized to print at scale 1:`denominator`,
/// along with the measurements used. The input figure is left untouched.
pub fn fit_to_scale(figure: &Figure, denominator: f64) -> Result<(Figure, ScaleFit)> {
    let fit = measure(figure, denominator)?;
    let (initial_x, initial_y) = fit.initial_scale();
    info!("initial scale x = {initial_x:.6}, y = {initial_y:.6}");
    info!("ratio width = {:.6}, height = {:.6}", fit.ratio.0, fit.ratio.1);
    let mut fitted = figure.clone();
    let (w, h) = figure.size_inches();
    fitted.set_size_inches(w * fit.ratio.0, h * fit.ratio.1)?;
    Ok((fitted, fit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Extent;

    fn figure(w: f64, h: f64) -> Figure {
        Figure::new(Extent {
            min_x: 100.0,
            min_y: 200.0,
            max_x: 100.0 + w,
            max_y: 200.0 + h,
        })
        .unwrap()
    }

    #[test]
    fn ratio_is_target_over_current() {
        // 10 cm rendered, 50 m of ground at 1:200 should be 25 cm.
        let r = resize_ratio(10.0, 50.0, 200.0);
        assert_eq!(format!("{r:.4}"), "2.5000");
    }

    #[test]
    fn measure_matches_manual_computation() {
        let fig = figure(44.0, 30.0);
        let fit = measure(&fig, 200.0).unwrap();
        let axes = fig.axes_box();
        let expect = (44.0 * 100.0 / 200.0) / (axes.width * 2.54);
        assert!((fit.ratio.0 - expect).abs() < 1e-4);
        let direct = resize_ratio(fit.current_cm.0, 44.0, 200.0);
        assert_eq!(format!("{:.4}", fit.ratio.0), format!("{direct:.4}"));
        assert!((fit.ratio.0 - fit.ratio.1).abs() < 1e-9);
        assert!((fit.target_cm.0 - 22.0).abs() < 1e-9);
        assert!((fit.target_cm.1 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn fitted_axes_print_at_scale() {
        let fig = figure(44.0, 30.0);
        let (fitted, _) = fit_to_scale(&fig, 500.0).unwrap();
        let axes = fitted.axes_box();
        assert!((axes.width * CM_PER_INCH - 44.0 * 100.0 / 500.0).abs() < 1e-6);
        assert!((axes.height * CM_PER_INCH - 30.0 * 100.0 / 500.0).abs() < 1e-6);
        // The input figure is unchanged.
        assert_eq!(fig.size_inches(), (6.4, 4.8));
    }

    #[test]
    fn fit_is_stable_when_repeated() {
        let fig = figure(12.0, 80.0);
        let (once, _) = fit_to_scale(&fig, 100.0).unwrap();
        let (_, again) = fit_to_scale(&once, 100.0).unwrap();
        assert!((again.ratio.0 - 1.0).abs() < 1e-9);
        assert!((again.ratio.1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bad_denominator_rejected() {
        let fig = figure(10.0, 10.0);
        assert!(measure(&fig, 0.0).is_err());
        assert!(measure(&fig, -200.0).is_err());
        assert!(measure(&fig, f64::INFINITY).is_err());
    }
}
