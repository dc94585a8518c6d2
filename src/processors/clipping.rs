//! Sutherland–Hodgman clipping of convex pixel footprints against unit grid cells.
//!
//! Coordinates are fractional grid coordinates: cell (x, y) spans `[x, x + 1] × [y, y + 1]`,
//! with y growing southwards.

/// Each of the four cell edges adds at most one vertex, so a clipped quadrilateral has at
/// most eight
const MAX_VERTICES: usize = 8;
/// Largest input polygon whose clipped form still fits in `MAX_VERTICES`
const MAX_INPUT_VERTICES: usize = MAX_VERTICES - 4;

#[derive(Debug, Clone, Copy)]
enum Edge {
    /// keep x >= value
    Left(f64),
    /// keep x <= value
    Right(f64),
    /// keep y >= value
    Top(f64),
    /// keep y <= value
    Bottom(f64),
}

impl Edge {
    #[inline]
    fn inside(self, (x, y): (f64, f64)) -> bool {
        match self {
            Edge::Left(v) => x >= v,
            Edge::Right(v) => x <= v,
            Edge::Top(v) => y >= v,
            Edge::Bottom(v) => y <= v,
        }
    }

    /// Crossing of segment p→q with the edge line; p and q lie on opposite sides
    #[inline]
    fn intersect(self, p: (f64, f64), q: (f64, f64)) -> (f64, f64) {
        match self {
            Edge::Left(v) | Edge::Right(v) => {
                let t = (v - p.0) / (q.0 - p.0);
                (v, p.1 + t * (q.1 - p.1))
            }
            Edge::Top(v) | Edge::Bottom(v) => {
                let t = (v - p.1) / (q.1 - p.1);
                (p.0 + t * (q.0 - p.0), v)
            }
        }
    }
}

/// Reusable clipping scratch space. Not shared between threads.
#[derive(Debug, Clone)]
pub struct Clipper {
    front: [(f64, f64); MAX_VERTICES],
    back: [(f64, f64); MAX_VERTICES],
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            front: [(0.0, 0.0); MAX_VERTICES],
            back: [(0.0, 0.0); MAX_VERTICES],
        }
    }

    /// Area of the part of the convex `polygon` inside cell (`cell_x`, `cell_y`). Only the
    /// first four vertices of `polygon` are used.
    pub fn clipped_area(&mut self, polygon: &[(f64, f64)], cell_x: f64, cell_y: f64) -> f64 {
        let n = polygon.len().min(MAX_INPUT_VERTICES);
        if n < 3 {
            return 0.0;
        }
        self.front[..n].copy_from_slice(&polygon[..n]);

        let edges = [
            Edge::Left(cell_x),
            Edge::Right(cell_x + 1.0),
            Edge::Top(cell_y),
            Edge::Bottom(cell_y + 1.0),
        ];
        let mut len = n;
        for edge in edges {
            len = clip_edge(edge, &self.front[..len], &mut self.back);
            std::mem::swap(&mut self.front, &mut self.back);
            if len < 3 {
                return 0.0;
            }
        }
        convex_area(&self.front[..len])
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

fn clip_edge(edge: Edge, input: &[(f64, f64)], output: &mut [(f64, f64); MAX_VERTICES]) -> usize {
    let mut count = 0;
    let mut push = |v: (f64, f64)| {
        if count < MAX_VERTICES {
            output[count] = v;
            count += 1;
        }
    };

    let Some(&last) = input.last() else {
        return 0;
    };
    let mut prev = last;
    let mut prev_inside = edge.inside(prev);
    for &current in input {
        let current_inside = edge.inside(current);
        if current_inside {
            if !prev_inside {
                push(edge.intersect(prev, current));
            }
            push(current);
        } else if prev_inside {
            push(edge.intersect(prev, current));
        }
        prev = current;
        prev_inside = current_inside;
    }
    count
}

/// Area of a convex polygon given as an ordered vertex ring, by fan triangulation
pub fn convex_area(vertices: &[(f64, f64)]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let origin = vertices[0];
    vertices[1..]
        .windows(2)
        .map(|pair| triangle_area(origin, pair[0], pair[1]))
        .sum()
}

/// Triangle area from two edge vectors, `½·sqrt(|a|²|b|² − (a·b)²)`.
/// Negative round-off under the root counts as a degenerate triangle.
pub fn triangle_area(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let (ax, ay) = (p0.0 - p1.0, p0.1 - p1.1);
    let (bx, by) = (p0.0 - p2.0, p0.1 - p2.1);
    let dot = ax * bx + ay * by;
    let squared = (ax * ax + ay * ay) * (bx * bx + by * by) - dot * dot;
    if squared <= 0.0 {
        0.0
    } else {
        squared.sqrt() / 2.0
    }
}
