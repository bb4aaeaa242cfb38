//! Area shapes used by `inside` and area mappings.

use serde::{Deserialize, Serialize};

/// A region of an image, in integer pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum Shape {
    /// The whole image; every point is inside.
    Default,
    Rect {
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
    },
    Circle {
        x: i64,
        y: i64,
        radius: i64,
    },
    /// Closed polygon; the last vertex connects back to the first.
    Poly { points: Vec<(i64, i64)> },
    Ellipse {
        x: i64,
        y: i64,
        h_radius: i64,
        v_radius: i64,
    },
}

impl Shape {
    pub fn contains(&self, px: i64, py: i64) -> bool {
        match self {
            Shape::Default => true,
            Shape::Rect {
                left,
                top,
                right,
                bottom,
            } => {
                let (x0, x1) = (left.min(right), left.max(right));
                let (y0, y1) = (top.min(bottom), top.max(bottom));
                px >= *x0 && px <= *x1 && py >= *y0 && py <= *y1
            }
            Shape::Circle { x, y, radius } => {
                let dx = px as f64 - *x as f64;
                let dy = py as f64 - *y as f64;
                let r = *radius as f64;
                dx * dx + dy * dy <= r * r
            }
            Shape::Ellipse {
                x,
                y,
                h_radius,
                v_radius,
            } => {
                if *h_radius <= 0 || *v_radius <= 0 {
                    return false;
                }
                let dx = (px as f64 - *x as f64) / *h_radius as f64;
                let dy = (py as f64 - *y as f64) / *v_radius as f64;
                dx * dx + dy * dy <= 1.0
            }
            Shape::Poly { points } => polygon_contains(points, px as f64, py as f64),
        }
    }
}

/// Even-odd ray casting; points on an edge count as inside.
fn polygon_contains(points: &[(i64, i64)], px: f64, py: f64) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = (points[i].0 as f64, points[i].1 as f64);
        let (xj, yj) = (points[j].0 as f64, points[j].1 as f64);
        if on_segment(xi, yi, xj, yj, px, py) {
            return true;
        }
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(x1: f64, y1: f64, x2: f64, y2: f64, px: f64, py: f64) -> bool {
    let cross = (px - x1) * (y2 - y1) - (py - y1) * (x2 - x1);
    cross == 0.0
        && px >= x1.min(x2)
        && px <= x1.max(x2)
        && py >= y1.min(y2)
        && py <= y1.max(y2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_includes_edges() {
        let r = Shape::Rect {
            left: 0,
            top: 0,
            right: 10,
            bottom: 5,
        };
        assert!(r.contains(0, 0));
        assert!(r.contains(10, 5));
        assert!(!r.contains(11, 5));
    }

    #[test]
    fn circle_and_ellipse() {
        let c = Shape::Circle { x: 5, y: 5, radius: 2 };
        assert!(c.contains(5, 7));
        assert!(!c.contains(7, 7));
        let e = Shape::Ellipse {
            x: 0,
            y: 0,
            h_radius: 4,
            v_radius: 2,
        };
        assert!(e.contains(4, 0));
        assert!(!e.contains(0, 3));
    }

    #[test]
    fn extreme_points_do_not_overflow() {
        let c = Shape::Circle { x: -10, y: 0, radius: 5 };
        assert!(!c.contains(i64::MAX, 0));
        assert!(!c.contains(0, i64::MIN));
        let e = Shape::Ellipse {
            x: 10,
            y: -10,
            h_radius: 3,
            v_radius: 3,
        };
        assert!(!e.contains(i64::MIN, i64::MAX));
    }

    #[test]
    fn poly_triangle() {
        let p = Shape::Poly {
            points: vec![(0, 0), (10, 0), (0, 10)],
        };
        assert!(p.contains(2, 2));
        assert!(p.contains(5, 0));
        assert!(!p.contains(8, 8));
    }

    #[test]
    fn default_contains_everything() {
        assert!(Shape::Default.contains(-1000, 1000));
    }
}
