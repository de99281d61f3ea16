use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Polygon, Vertex, orientation, segments_intersect, twice_signed_area};
use crate::pixel;

/// Upper bound on vertices in one plot outline.
pub const MAX_VERTICES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PolygonError {
    #[error("a plot needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },
    #[error("a plot may have at most {max} vertices, got {count}")]
    TooManyVertices { count: usize, max: usize },
    #[error("vertex ({x}, {y}) is outside the canvas")]
    CoordinateOutOfRange { x: i32, y: i32 },
    #[error("the outline crosses itself")]
    SelfIntersecting,
    #[error("the outline encloses less than one pixel")]
    ZeroArea,
}

/// Validate a vertex ring and return it as a [`Polygon`].
pub fn validate_polygon(vertices: &[Vertex]) -> Result<Polygon, PolygonError> {
    let count = vertices.len();
    if count < 3 {
        return Err(PolygonError::TooFewVertices { count });
    }
    if count > MAX_VERTICES {
        return Err(PolygonError::TooManyVertices {
            count,
            max: MAX_VERTICES,
        });
    }
    if let Some(v) = vertices.iter().find(|v| !pixel::in_bounds(v.x, v.y)) {
        return Err(PolygonError::CoordinateOutOfRange { x: v.x, y: v.y });
    }
    if !is_simple(vertices) {
        return Err(PolygonError::SelfIntersecting);
    }
    if twice_signed_area(vertices).abs() < 2 {
        return Err(PolygonError::ZeroArea);
    }
    Ok(Polygon::new(vertices.to_vec()))
}

/// Whether the closed ring has no repeated points, no crossings and no
/// edge doubling back over its neighbour.
pub fn is_simple(vertices: &[Vertex]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let edge = |i: usize| (vertices[i], vertices[(i + 1) % n]);

    for i in 0..n {
        let (a, b) = edge(i);
        if a == b {
            return false;
        }
        for j in (i + 1)..n {
            let (c, d) = edge(j);
            let adjacent_after = j == i + 1;
            let adjacent_wrap = i == 0 && j == n - 1;
            if adjacent_after {
                // shared vertex b == c; overlap if d folds back along a-b
                if folds_back(b, a, d) {
                    return false;
                }
            } else if adjacent_wrap {
                // shared vertex a == d
                if folds_back(a, b, c) {
                    return false;
                }
            } else if segments_intersect(a, b, c, d) {
                return false;
            }
        }
    }
    true
}

/// Two edges leaving `shared` towards `p` and `q` overlap along a line.
fn folds_back(shared: Vertex, p: Vertex, q: Vertex) -> bool {
    if orientation(shared, p, q) != 0 {
        return false;
    }
    let dot = (p.x as i64 - shared.x as i64) * (q.x as i64 - shared.x as i64)
        + (p.y as i64 - shared.y as i64) * (q.y as i64 - shared.y as i64);
    dot > 0
}

/// Price of a polygon: enclosed area in whole pixels, halves rounded up.
pub fn cost(polygon: &Polygon) -> i64 {
    (polygon.twice_area() + 1) / 2
}

/// Local pre-flight check. The server re-checks and is authoritative.
pub fn can_afford(balance: i64, cost: i64) -> bool {
    cost <= 0 || balance >= cost
}

/// Signed charge for reshaping a plot: positive debits, negative refunds.
pub fn edit_delta(previous: &Polygon, next: &Polygon) -> i64 {
    cost(next) - cost(previous)
}

/// Amount returned to the owner when a plot is deleted.
pub fn refund(polygon: &Polygon) -> i64 {
    cost(polygon)
}

/// Charge for creating (`previous == None`) or reshaping a plot.
pub fn charge_for(previous: Option<&Polygon>, next: &Polygon) -> i64 {
    match previous {
        Some(previous) => edit_delta(previous, next),
        None => cost(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(i32, i32)]) -> Vec<Vertex> {
        points.iter().map(|&(x, y)| Vertex::new(x, y)).collect()
    }

    #[test]
    fn ten_by_ten_square_costs_one_hundred() {
        let polygon = validate_polygon(&ring(&[(0, 0), (0, 10), (10, 10), (10, 0)]))
            .expect("square is valid");
        assert_eq!(cost(&polygon), 100);
    }

    #[test]
    fn rectangle_cost_is_width_times_height() {
        for (w, h) in [(1, 1), (3, 7), (64, 2), (250, 250)] {
            assert_eq!(cost(&Polygon::rectangle(-5, 9, -5 + w, 9 + h)), (w * h) as i64);
        }
    }

    #[test]
    fn bow_tie_is_self_intersecting() {
        let result = validate_polygon(&ring(&[(0, 0), (10, 10), (10, 0), (0, 10)]));
        assert_eq!(result, Err(PolygonError::SelfIntersecting));
    }

    #[test]
    fn touching_and_repeated_vertices_are_self_intersecting() {
        // pinched at (5, 5)
        let pinched = ring(&[(0, 0), (5, 5), (10, 0), (10, 10), (5, 5), (0, 10)]);
        assert_eq!(
            validate_polygon(&pinched),
            Err(PolygonError::SelfIntersecting)
        );
        let doubled = ring(&[(0, 0), (4, 0), (4, 0), (4, 4)]);
        assert_eq!(
            validate_polygon(&doubled),
            Err(PolygonError::SelfIntersecting)
        );
        let spike = ring(&[(0, 0), (6, 0), (3, 0), (3, 4)]);
        assert_eq!(validate_polygon(&spike), Err(PolygonError::SelfIntersecting));
    }

    #[test]
    fn too_few_vertices_and_flat_rings_are_rejected() {
        assert_eq!(
            validate_polygon(&ring(&[(0, 0), (1, 1)])),
            Err(PolygonError::TooFewVertices { count: 2 })
        );
        // half a pixel of area
        assert_eq!(
            validate_polygon(&ring(&[(0, 0), (1, 0), (0, 1)])),
            Err(PolygonError::ZeroArea)
        );
    }

    #[test]
    fn out_of_range_vertices_are_rejected() {
        let far = crate::pixel::COORD_MAX + 1;
        assert_eq!(
            validate_polygon(&ring(&[(0, 0), (far, 0), (0, 5)])),
            Err(PolygonError::CoordinateOutOfRange { x: far, y: 0 })
        );
    }

    #[test]
    fn edits_charge_signed_delta() {
        let small = Polygon::rectangle(0, 0, 4, 4);
        let large = Polygon::rectangle(0, 0, 8, 4);
        assert_eq!(edit_delta(&small, &large), 16);
        assert_eq!(edit_delta(&large, &small), -16);
        assert_eq!(charge_for(None, &small), 16);
        assert_eq!(charge_for(Some(&large), &small), -16);
        assert_eq!(refund(&large), 32);
    }

    #[test]
    fn affordability() {
        assert!(can_afford(100, 100));
        assert!(!can_afford(99, 100));
        assert!(can_afford(0, -20));
    }
}
