//! Interpolation kernels used by channel iterators.
//!
//! Every kernel works on a [`Window`]: the sample at or before the read
//! position, the sample after it, and for the smooth kernel one further
//! neighbour on each side.
//!
//! | Mode       | Samples used          | Exact at samples |
//! |------------|-----------------------|------------------|
//! | `Previous` | before                | yes              |
//! | `Nearest`  | before, after         | yes              |
//! | `Linear`   | before, after         | yes              |
//! | `Smooth`   | prev, before, after, next | yes          |

use crate::config::InterpolationMode;
use crate::sample::Sample;

/// Samples surrounding a read position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// Sample before `before`, if any.
    pub prev: Option<Sample>,
    /// Last sample at or before the read position.
    pub before: Sample,
    /// First sample strictly after the read position, if any.
    pub after: Option<Sample>,
    /// Sample after `after`, if any.
    pub next: Option<Sample>,
}

impl Window {
    /// A window holding only the sample at or before the position.
    pub fn single(before: Sample) -> Self {
        Self {
            prev: None,
            before,
            after: None,
            next: None,
        }
    }
}

/// Evaluates `window` at `x` using `mode`.
///
/// `x` is expected to satisfy `before.x <= x < after.x`. Without an `after`
/// sample every mode holds the value of `before`.
///
/// # Examples
///
/// ```rust
/// use rtgraph::config::InterpolationMode;
/// use rtgraph::interpolate::{interpolate, Window};
/// use rtgraph::sample::Sample;
///
/// let window = Window {
///     prev: None,
///     before: Sample::new(0.0, 0.0),
///     after: Some(Sample::new(2.0, 10.0)),
///     next: None,
/// };
/// assert_eq!(interpolate(InterpolationMode::Previous, 1.5, &window), 0.0);
/// assert_eq!(interpolate(InterpolationMode::Nearest, 1.5, &window), 10.0);
/// assert_eq!(interpolate(InterpolationMode::Linear, 1.5, &window), 7.5);
/// ```
pub fn interpolate(mode: InterpolationMode, x: f64, window: &Window) -> f64 {
    let before = window.before;
    let Some(after) = window.after else {
        return before.y;
    };
    if x <= before.x {
        return before.y;
    }

    match mode {
        InterpolationMode::Previous => before.y,
        InterpolationMode::Nearest => nearest(x, before, after),
        InterpolationMode::Linear => linear(x, before, after),
        InterpolationMode::Smooth => match (window.prev, window.next) {
            (Some(prev), Some(next)) => smooth(x, prev, before, after, next),
            _ => linear(x, before, after),
        },
    }
}

/// Value of the closer sample; ties go to `before`.
pub fn nearest(x: f64, before: Sample, after: Sample) -> f64 {
    if x - before.x <= after.x - x {
        before.y
    } else {
        after.y
    }
}

/// Straight line through `before` and `after`.
pub fn linear(x: f64, before: Sample, after: Sample) -> f64 {
    let span = after.x - before.x;
    if span <= 0.0 {
        return before.y;
    }
    let t = (x - before.x) / span;
    before.y + (after.y - before.y) * t
}

/// Cubic Hermite between `p1` and `p2` with Catmull-Rom tangents.
///
/// Tangents are the finite-difference slopes `(y2 - y0) / (x2 - x0)` and
/// `(y3 - y1) / (x3 - x1)`, which handles uneven spacing and reduces to the
/// classic Catmull-Rom spline when samples are evenly spaced.
pub fn smooth(x: f64, p0: Sample, p1: Sample, p2: Sample, p3: Sample) -> f64 {
    let h = p2.x - p1.x;
    if h <= 0.0 {
        return p1.y;
    }

    let m1 = slope(p0, p2);
    let m2 = slope(p1, p3);

    let t = (x - p1.x) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * p1.y + h10 * h * m1 + h01 * p2.y + h11 * h * m2
}

fn slope(a: Sample, b: Sample) -> f64 {
    let dx = b.x - a.x;
    if dx > 0.0 { (b.y - a.y) / dx } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: f64, y: f64) -> Sample {
        Sample::new(x, y)
    }

    fn window(points: [(f64, f64); 4]) -> Window {
        Window {
            prev: Some(s(points[0].0, points[0].1)),
            before: s(points[1].0, points[1].1),
            after: Some(s(points[2].0, points[2].1)),
            next: Some(s(points[3].0, points[3].1)),
        }
    }

    #[test]
    fn test_all_modes_exact_at_sample() {
        let w = window([(0.0, 3.0), (1.0, 7.0), (2.0, -1.0), (3.0, 4.0)]);
        for mode in InterpolationMode::ALL {
            assert_eq!(interpolate(mode, 1.0, &w), 7.0, "{mode}");
        }
    }

    #[test]
    fn test_hold_without_after() {
        let w = Window::single(s(5.0, 2.5));
        for mode in InterpolationMode::ALL {
            assert_eq!(interpolate(mode, 100.0, &w), 2.5);
        }
    }

    #[test]
    fn test_nearest_tie_goes_before() {
        assert_eq!(nearest(1.5, s(1.0, 10.0), s(2.0, 20.0)), 10.0);
        assert_eq!(nearest(1.4, s(1.0, 10.0), s(2.0, 20.0)), 10.0);
        assert_eq!(nearest(1.6, s(1.0, 10.0), s(2.0, 20.0)), 20.0);
    }

    #[test]
    fn test_linear() {
        assert_eq!(linear(1.25, s(1.0, 0.0), s(2.0, 4.0)), 1.0);
        assert_eq!(linear(0.0, s(0.0, -2.0), s(4.0, 2.0)), -2.0);
    }

    #[test]
    fn test_smooth_reproduces_lines() {
        // Catmull-Rom is exact on linear data
        let w = window([(0.0, 1.0), (1.0, 3.0), (2.0, 5.0), (3.0, 7.0)]);
        let y = interpolate(InterpolationMode::Smooth, 1.3, &w);
        assert!((y - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_uniform_matches_catmull_rom() {
        let (p0, p1, p2, p3) = (2.0, 4.0, 1.0, 3.0);
        let w = window([(0.0, p0), (1.0, p1), (2.0, p2), (3.0, p3)]);
        let t: f64 = 0.5;
        let expected = 0.5
            * ((2.0 * p1)
                + (-p0 + p2) * t
                + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
                + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t * t * t);

        let y = interpolate(InterpolationMode::Smooth, 1.5, &w);
        assert!((y - expected).abs() < 1e-12, "{y} vs {expected}");
    }

    #[test]
    fn test_smooth_falls_back_to_linear() {
        let w = Window {
            prev: None,
            before: s(0.0, 0.0),
            after: Some(s(1.0, 10.0)),
            next: Some(s(2.0, 0.0)),
        };
        assert_eq!(interpolate(InterpolationMode::Smooth, 0.5, &w), 5.0);
    }

    #[test]
    fn test_smooth_uneven_spacing_is_continuous() {
        let w = window([(0.0, 0.0), (0.1, 1.0), (5.0, 2.0), (5.2, 0.0)]);
        let near_start = interpolate(InterpolationMode::Smooth, 0.1 + 1e-9, &w);
        let near_end = interpolate(InterpolationMode::Smooth, 5.0 - 1e-9, &w);
        assert!((near_start - 1.0).abs() < 1e-6);
        assert!((near_end - 2.0).abs() < 1e-6);
    }
}
