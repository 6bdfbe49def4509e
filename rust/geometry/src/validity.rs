// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simple-feature validity for polygonal footprints
//!
//! A polygon is valid when all coordinates are finite, every ring is closed
//! with at least four positions and non-zero area, no ring crosses or
//! overlaps itself, and every hole lies inside its shell. Empty geometries
//! are valid. Overlap between the members of a multipolygon is not checked.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Intersects, Line, LineString, MultiPolygon, Point, Polygon};

/// Validity of every member polygon
pub fn is_valid(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.iter().all(is_valid_polygon)
}

pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    let exterior = polygon.exterior();
    if exterior.0.is_empty() {
        // Empty polygon, holes make no sense without a shell
        return polygon.interiors().is_empty();
    }
    if !is_valid_ring(exterior) {
        return false;
    }

    let shell = Polygon::new(exterior.clone(), Vec::new());
    polygon
        .interiors()
        .iter()
        .all(|hole| is_valid_ring(hole) && hole_inside_shell(hole, &shell))
}

fn is_valid_ring(ring: &LineString<f64>) -> bool {
    if ring.0.len() < 4 || !ring.is_closed() || !ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return false;
    }
    // Repeated consecutive positions are allowed and ignored
    let distinct = without_repeats(ring);
    distinct.0.len() >= 4 && ring_area2(&distinct) != 0.0 && !self_intersects(&distinct)
}

fn without_repeats(ring: &LineString<f64>) -> LineString<f64> {
    let mut coords = ring.0.clone();
    coords.dedup();
    LineString::new(coords)
}

/// Twice the signed shoelace area
fn ring_area2(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|l| l.start.x * l.end.y - l.end.x * l.start.y)
        .sum()
}

/// Pairwise segment test; `ring` must not repeat consecutive positions
fn self_intersects(ring: &LineString<f64>) -> bool {
    let segments: Vec<Line<f64>> = ring.lines().collect();
    let count = segments.len();

    for i in 0..count {
        for j in (i + 1)..count {
            let adjacent = j == i + 1 || (i == 0 && j == count - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                // Neighbours share exactly their common vertex
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return true,
            }
        }
    }
    false
}

/// Every hole vertex inside or on the shell, and no proper crossing
fn hole_inside_shell(hole: &LineString<f64>, shell: &Polygon<f64>) -> bool {
    if !hole.points().all(|p: Point<f64>| shell.intersects(&p)) {
        return false;
    }
    hole.lines().all(|h| {
        shell.exterior().lines().all(|s| {
            !matches!(
                line_intersection(h, s),
                Some(LineIntersection::SinglePoint { is_proper: true, .. })
                    | Some(LineIntersection::Collinear { .. })
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    #[test]
    fn test_square_is_valid() {
        assert!(is_valid_polygon(&square(0.0, 0.0, 10.0)));
        assert!(is_valid(&MultiPolygon::new(vec![
            square(0.0, 0.0, 1.0),
            square(5.0, 5.0, 1.0)
        ])));
    }

    #[test]
    fn test_empty_is_valid() {
        assert!(is_valid(&MultiPolygon::new(Vec::new())));
        assert!(is_valid_polygon(&Polygon::new(LineString::new(Vec::new()), Vec::new())));
    }

    #[test]
    fn test_bow_tie_is_invalid() {
        let bow_tie = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(!is_valid_polygon(&bow_tie));
    }

    #[test]
    fn test_repeated_vertices_are_valid() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (0.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]);
        assert!(is_valid_polygon(&Polygon::new(ring, Vec::new())));

        let hole = LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 2.0)]);
        let with_hole = Polygon::new(square(0.0, 0.0, 10.0).exterior().clone(), vec![hole]);
        assert!(is_valid_polygon(&with_hole));

        // Repeats do not count towards the four positions
        let collapsed = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        assert!(!is_valid_polygon(&Polygon::new(collapsed, Vec::new())));
    }

    #[test]
    fn test_too_few_points_and_zero_area() {
        let triangle_open = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]),
            Vec::new(),
        );
        // geo closes rings on construction; three distinct points still make four positions
        assert!(is_valid_polygon(&triangle_open));

        let line = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 0.0)]),
            Vec::new(),
        );
        assert!(!is_valid_polygon(&line));

        let degenerate = Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]), Vec::new());
        assert!(!is_valid_polygon(&degenerate));
    }

    #[test]
    fn test_non_finite_is_invalid() {
        let p = square(0.0, 0.0, f64::INFINITY);
        assert!(!is_valid_polygon(&p));
    }

    #[test]
    fn test_holes() {
        let inner = square(2.0, 2.0, 2.0).exterior().clone();
        let with_hole = Polygon::new(square(0.0, 0.0, 10.0).exterior().clone(), vec![inner]);
        assert!(is_valid_polygon(&with_hole));

        let outside = square(20.0, 20.0, 2.0).exterior().clone();
        let bad = Polygon::new(square(0.0, 0.0, 10.0).exterior().clone(), vec![outside]);
        assert!(!is_valid_polygon(&bad));

        let crossing = square(8.0, 8.0, 4.0).exterior().clone();
        let bad = Polygon::new(square(0.0, 0.0, 10.0).exterior().clone(), vec![crossing]);
        assert!(!is_valid_polygon(&bad));
    }
}
