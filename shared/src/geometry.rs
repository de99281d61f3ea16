use serde::{Deserialize, Serialize};

/// A polygon corner on the integer world grid. Vertices sit on pixel corners,
/// so the unit square `(0,0)-(1,1)` encloses exactly the pixel at `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

impl Vertex {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A closed ring of vertices. The last vertex connects back to the first.
///
/// Construction does not validate; use [`crate::claim::validate_polygon`] before
/// trusting a polygon received from input or the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned rectangle covering pixels `min..max` (max exclusive).
    pub fn rectangle(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self::new(vec![
            Vertex::new(min_x, min_y),
            Vertex::new(max_x, min_y),
            Vertex::new(max_x, max_y),
            Vertex::new(min_x, max_y),
        ])
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Twice the enclosed area (shoelace), always non-negative.
    pub fn twice_area(&self) -> i64 {
        twice_signed_area(&self.vertices).abs()
    }

    pub fn area(&self) -> f64 {
        self.twice_area() as f64 / 2.0
    }

    /// `(min_x, min_y, max_x, max_y)` over the vertices.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let first = self.vertices.first()?;
        Some(self.vertices.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), v| {
                (min_x.min(v.x), min_y.min(v.y), max_x.max(v.x), max_y.max(v.y))
            },
        ))
    }

    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.vertices
                .iter()
                .map(|v| Vertex::new(v.x.saturating_add(dx), v.y.saturating_add(dy)))
                .collect(),
        )
    }

    /// Even-odd point test. Points exactly on the boundary may land either way;
    /// use [`Polygon::strictly_contains`] when that matters.
    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            if (ay > py) != (by > py) {
                let cross_x = ax + (py - ay) * (bx - ax) / (by - ay);
                if px < cross_x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Whether the pixel at `(x, y)` is enclosed (sampled at its centre).
    pub fn contains_pixel(&self, x: i32, y: i32) -> bool {
        self.contains_point(x as f64 + 0.5, y as f64 + 0.5)
    }

    pub fn on_boundary(&self, px: f64, py: f64) -> bool {
        self.edges().any(|(a, b)| point_on_segment_f64(a, b, px, py))
    }

    pub fn strictly_contains(&self, px: f64, py: f64) -> bool {
        !self.on_boundary(px, py) && self.contains_point(px, py)
    }

    /// Whether the interiors of two simple polygons share any area. Shared
    /// borders do not count.
    pub fn overlaps(&self, other: &Polygon) -> bool {
        let (Some(a), Some(b)) = (self.bounds(), other.bounds()) else {
            return false;
        };
        if a.2 <= b.0 || b.2 <= a.0 || a.3 <= b.1 || b.3 <= a.1 {
            return false;
        }

        for (p1, p2) in self.edges() {
            for (q1, q2) in other.edges() {
                if segments_cross_properly(p1, p2, q1, q2) {
                    return true;
                }
            }
        }

        if self.probe_points().any(|(x, y)| other.strictly_contains(x, y))
            || other.probe_points().any(|(x, y)| self.strictly_contains(x, y))
        {
            return true;
        }

        same_ring(&self.vertices, &other.vertices)
    }

    /// Vertices and edge midpoints.
    fn probe_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.edges().flat_map(|(a, b)| {
            [
                (a.x as f64, a.y as f64),
                ((a.x as f64 + b.x as f64) / 2.0, (a.y as f64 + b.y as f64) / 2.0),
            ]
        })
    }
}

/// Shoelace sum; positive for counter-clockwise rings in a y-up frame.
pub fn twice_signed_area(vertices: &[Vertex]) -> i64 {
    let n = vertices.len();
    if n < 3 {
        return 0;
    }
    (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum()
}

/// Cross product of `(b - a) x (c - a)`.
pub fn orientation(a: Vertex, b: Vertex, c: Vertex) -> i64 {
    (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64)
        - (b.y as i64 - a.y as i64) * (c.x as i64 - a.x as i64)
}

fn within_box(a: Vertex, b: Vertex, p: Vertex) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether segments `p1p2` and `q1q2` share at least one point.
pub fn segments_intersect(p1: Vertex, p2: Vertex, q1: Vertex, q2: Vertex) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
        return true;
    }

    (d1 == 0 && within_box(q1, q2, p1))
        || (d2 == 0 && within_box(q1, q2, p2))
        || (d3 == 0 && within_box(p1, p2, q1))
        || (d4 == 0 && within_box(p1, p2, q2))
}

/// Whether the segments cross at a single point interior to both.
fn segments_cross_properly(p1: Vertex, p2: Vertex, q1: Vertex, q2: Vertex) -> bool {
    let d1 = orientation(q1, q2, p1).signum();
    let d2 = orientation(q1, q2, p2).signum();
    let d3 = orientation(p1, p2, q1).signum();
    let d4 = orientation(p1, p2, q2).signum();
    d1 * d2 < 0 && d3 * d4 < 0
}

fn point_on_segment_f64(a: Vertex, b: Vertex, px: f64, py: f64) -> bool {
    let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > 1e-9 {
        return false;
    }
    px >= ax.min(bx) && px <= ax.max(bx) && py >= ay.min(by) && py <= ay.max(by)
}

/// Same vertex cycle in either direction and from any starting vertex.
fn same_ring(a: &[Vertex], b: &[Vertex]) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    let n = a.len();
    let Some(start) = b.iter().position(|v| *v == a[0]) else {
        return false;
    };
    let forward = (0..n).all(|i| a[i] == b[(start + i) % n]);
    let backward = (0..n).all(|i| a[i] == b[(start + n - i) % n]);
    forward || backward
}
