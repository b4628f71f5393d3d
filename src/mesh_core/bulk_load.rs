use num_traits::Float;

use super::math;
use super::mesh::{Mesh, VertexMarker, VertexProvenance};
use super::{FixedVertexHandle, InsertionResult};
use crate::{Point2, Scalar, TriangulationError};

impl<S: Scalar + Float> Mesh<S> {
    /// Creates a Delaunay triangulation of a point set.
    ///
    /// All coordinates must be finite and within the supported range (see
    /// [crate::MIN_ALLOWED_VALUE] and [crate::MAX_ALLOWED_VALUE]), no two points may
    /// coincide and at least three points must not share a single line. Validation
    /// happens before anything is built: on `Err`, no mesh exists.
    ///
    /// Points are inserted in lexicographic order, which keeps the location walks
    /// short and makes the triangulation reproducible for identical inputs.
    /// Pathological inputs (e.g. many points on a common circle) may degrade the
    /// construction to quadratic time; this is documented behavior, not an error.
    pub fn bulk_load(points: Vec<Point2<S>>) -> Result<Self, TriangulationError> {
        let entries = points
            .into_iter()
            .map(|point| (point, VertexMarker::Interior))
            .collect();
        let (mesh, _) = Self::bulk_load_core(entries)?;
        Ok(mesh)
    }

    /// Builds a mesh from validated entries, returning it together with the vertex
    /// handle assigned to each entry (indexed like `entries`).
    pub(crate) fn bulk_load_core(
        entries: Vec<(Point2<S>, VertexMarker)>,
    ) -> Result<(Self, Vec<FixedVertexHandle>), TriangulationError> {
        if entries.len() < 3 {
            return Err(TriangulationError::TooFewPoints {
                found: entries.len(),
            });
        }
        for (point, _) in &entries {
            math::validate_point(*point)?;
        }

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            let (pa, pb) = (entries[a].0, entries[b].0);
            pa.x.partial_cmp(&pb.x)
                .and_then(|x_order| Some(x_order.then(pa.y.partial_cmp(&pb.y)?)))
                .expect("coordinates have been validated")
        });

        for pair in order.windows(2) {
            if entries[pair[0]].0 == entries[pair[1]].0 {
                return Err(TriangulationError::DuplicatePoint {
                    index: pair[0].max(pair[1]),
                });
            }
        }

        // The first two points always seed the triangulation; the third seed vertex
        // is the first point not collinear with them.
        let (p0, p1) = (entries[order[0]].0, entries[order[1]].0);
        let seed_position = order[2..]
            .iter()
            .position(|&index| !math::side_query(p0, p1, entries[index].0).is_on_line())
            .map(|offset| offset + 2)
            .ok_or(TriangulationError::AllPointsCollinear)?;

        let mut mesh = Mesh::with_capacity(entries.len());
        let mut handles = vec![FixedVertexHandle::new(u32::MAX as usize); entries.len()];

        let seed_index = order[seed_position];
        let pk = entries[seed_index].0;
        for &index in [order[0], order[1], seed_index].iter() {
            let (point, marker) = entries[index];
            handles[index] = mesh.create_vertex(point, marker, VertexProvenance::Input);
        }
        let [v0, v1, v2] = [handles[order[0]], handles[order[1]], handles[seed_index]];
        if math::side_query(p0, p1, pk).is_on_left_side() {
            mesh.create_triangle([v0, v1, v2], false);
        } else {
            mesh.create_triangle([v1, v0, v2], false);
        }

        for (position, &index) in order.iter().enumerate() {
            if position <= 1 || position == seed_position {
                continue;
            }
            let (point, marker) = entries[index];
            match mesh.insert(point, marker, VertexProvenance::Input) {
                InsertionResult::Inserted(handle) => handles[index] = handle,
                InsertionResult::Existing(_) => {
                    unreachable!("duplicates are rejected before insertion")
                }
            }
        }

        if cfg!(debug_assertions) {
            mesh.sanity_check();
        }
        Ok((mesh, handles))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utilities::{assert_delaunay, random_points_with_seed, SEED};

    #[test]
    fn test_empty_and_tiny_inputs() {
        assert_eq!(
            Mesh::<f64>::bulk_load(vec![]).err(),
            Some(TriangulationError::TooFewPoints { found: 0 })
        );
        assert_eq!(
            Mesh::bulk_load(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).err(),
            Some(TriangulationError::TooFewPoints { found: 2 })
        );
    }

    #[test]
    fn test_invalid_coordinates() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, f64::NAN),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(
            Mesh::bulk_load(points).err(),
            Some(TriangulationError::NanCoordinate)
        );

        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(f64::INFINITY, 0.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(
            Mesh::bulk_load(points).err(),
            Some(TriangulationError::CoordinateTooLarge)
        );
    }

    #[test]
    fn test_collinear_input() {
        let points: Vec<_> = (0..10).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert_eq!(
            Mesh::bulk_load(points).err(),
            Some(TriangulationError::AllPointsCollinear)
        );
    }

    #[test]
    fn test_unit_square() {
        let mesh = Mesh::bulk_load(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_undirected_edges(), 5);
        assert_eq!(mesh.num_triangles(), 2);
    }

    #[test]
    fn test_collinear_prefix() {
        // The first four points in insertion order share the x axis.
        let mut points: Vec<_> = (0..4).map(|i| Point2::new(i as f64, 0.0)).collect();
        points.push(Point2::new(1.5, 2.0));
        points.push(Point2::new(2.5, -1.0));

        let mesh = Mesh::bulk_load(points).unwrap();
        assert_eq!(mesh.num_vertices(), 6);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_grid_is_handled() {
        let mut points = Vec::new();
        for x in 0..6 {
            for y in 0..6 {
                points.push(Point2::new(x as f64, y as f64));
            }
        }
        let mesh = Mesh::bulk_load(points).unwrap();
        assert_eq!(mesh.num_vertices(), 36);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_random_points() {
        let points = random_points_with_seed(120, SEED);
        let mesh = Mesh::bulk_load(points).unwrap();
        assert_eq!(mesh.num_vertices(), 120);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_euler_relation() {
        let points = random_points_with_seed(80, SEED);
        let mesh = Mesh::bulk_load(points).unwrap();

        let v = mesh.num_vertices() as i64;
        let e = mesh.num_undirected_edges() as i64;
        let f = mesh.num_triangles() as i64;
        assert_eq!(v - e + f, 1);
    }

    #[test]
    fn test_deterministic_rebuild() {
        let points = random_points_with_seed(50, SEED);
        let first = Mesh::bulk_load(points.clone()).unwrap();
        let second = Mesh::bulk_load(points).unwrap();

        let triangles = |mesh: &Mesh<f64>| {
            let mut all: Vec<_> = mesh
                .triangles()
                .map(|triangle| triangle.vertices().map(|v| v.index()))
                .collect();
            all.sort();
            all
        };
        assert_eq!(triangles(&first), triangles(&second));
    }
}
