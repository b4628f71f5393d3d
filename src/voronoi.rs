use hashbrown::HashMap;
use num_traits::Float;

use crate::mesh_core::{FixedTriangleHandle, FixedVertexHandle, Mesh};
use crate::{Point2, Scalar};

/// The Voronoi diagram dual to a finalized [Mesh].
///
/// The diagram is a self contained, read only snapshot: it holds no reference back
/// to the mesh and computing it twice from the same mesh yields identical results.
/// Every Voronoi vertex is the circumcenter of exactly one triangle of the mesh;
/// every face belongs to the mesh vertex it is closest to.
pub struct VoronoiDiagram<S> {
    vertices: Vec<Point2<S>>,
    faces: Vec<FaceData<S>>,
}

struct FaceData<S> {
    generator: FixedVertexHandle,
    /// Indices into [VoronoiDiagram::vertices], in counter clockwise order.
    boundary: Vec<usize>,
    /// `Some` for hull adjacent faces: outgoing directions attached to the first
    /// and last boundary vertex.
    rays: Option<[Point2<S>; 2]>,
}

impl<S: Scalar + Float> VoronoiDiagram<S> {
    fn from_mesh(mesh: &Mesh<S>) -> Self {
        let mut vertices = Vec::new();
        let mut circumcenter_indices: HashMap<FixedTriangleHandle, usize> = HashMap::new();
        let mut incident: Vec<Option<FixedTriangleHandle>> = vec![None; mesh.num_vertices()];

        for triangle in mesh.included_triangle_handles() {
            circumcenter_indices.insert(triangle, vertices.len());
            vertices.push(mesh.circumcenter_of(triangle).0);
            for vertex in mesh.tri(triangle).vertices {
                incident[vertex.index()].get_or_insert(triangle);
            }
        }

        let mut faces = Vec::new();
        for (index, start) in incident.iter().enumerate() {
            let Some(start) = *start else {
                // Every incident triangle lies in a hole or outside the boundary.
                continue;
            };
            let generator = FixedVertexHandle::new(index);
            let (fan, open) = included_fan(mesh, start, generator);
            let boundary = fan.iter().map(|t| circumcenter_indices[t]).collect();

            let rays = open.then(|| {
                let position = mesh.position(generator);
                let first = fan[0];
                let first_index = mesh.vertex_index(first, generator);
                let towards = mesh.tri(first).vertices[(first_index + 1) % 3];

                let last = fan[fan.len() - 1];
                let last_index = mesh.vertex_index(last, generator);
                let away = mesh.tri(last).vertices[(last_index + 2) % 3];

                // Outward normals of the two boundary edges meeting at the
                // generator.
                [
                    rotate_cw(mesh.position(towards).sub(position)),
                    rotate_cw(position.sub(mesh.position(away))),
                ]
            });

            faces.push(FaceData {
                generator,
                boundary,
                rays,
            });
        }

        VoronoiDiagram { vertices, faces }
    }

    /// Returns the number of Voronoi vertices, which equals the number of triangles
    /// of the generating mesh.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Returns the position of a Voronoi vertex.
    pub fn vertex_position(&self, index: usize) -> Point2<S> {
        self.vertices[index]
    }

    /// Iterates over all faces of the diagram.
    pub fn faces(&self) -> impl Iterator<Item = VoronoiFace<'_, S>> + '_ {
        (0..self.faces.len()).map(move |index| VoronoiFace {
            diagram: self,
            index,
        })
    }
}

/// A single cell of a [VoronoiDiagram]: the region of the plane closer to its
/// generating mesh vertex than to any other.
pub struct VoronoiFace<'a, S> {
    diagram: &'a VoronoiDiagram<S>,
    index: usize,
}

impl<'a, S: Scalar + Float> VoronoiFace<'a, S> {
    fn data(&self) -> &'a FaceData<S> {
        &self.diagram.faces[self.index]
    }

    /// Returns the mesh vertex this face belongs to.
    pub fn generator(&self) -> FixedVertexHandle {
        self.data().generator
    }

    /// Returns `true` if this face extends to infinity.
    ///
    /// This is the case for faces of hull vertices and of vertices on a boundary or
    /// hole loop.
    pub fn is_unbounded(&self) -> bool {
        self.data().rays.is_some()
    }

    /// For an unbounded face, the two outgoing ray directions: the first ray
    /// emanates from the first boundary vertex, the second from the last.
    pub fn ray_directions(&self) -> Option<[Point2<S>; 2]> {
        self.data().rays
    }

    /// The indices of the Voronoi vertices bounding this face, in counter
    /// clockwise order. An unbounded face yields an open chain.
    pub fn boundary_indices(&self) -> impl Iterator<Item = usize> + 'a {
        self.data().boundary.iter().copied()
    }

    /// The positions of the Voronoi vertices bounding this face, in counter
    /// clockwise order.
    pub fn boundary_vertices(&self) -> impl Iterator<Item = Point2<S>> + 'a {
        let diagram = self.diagram;
        self.data()
            .boundary
            .iter()
            .map(move |&index| diagram.vertices[index])
    }

    /// The finite edges of this face as position pairs, in counter clockwise order.
    ///
    /// A bounded face's edge sequence is closed; an unbounded face additionally
    /// extends along [Self::ray_directions] beyond the first and last vertex.
    pub fn edges(&self) -> impl Iterator<Item = [Point2<S>; 2]> + 'a {
        let data = self.data();
        let diagram = self.diagram;
        let count = data.boundary.len();
        let finite_edges = if data.rays.is_some() {
            count.saturating_sub(1)
        } else {
            count
        };
        (0..finite_edges).map(move |index| {
            [
                diagram.vertices[data.boundary[index]],
                diagram.vertices[data.boundary[(index + 1) % count]],
            ]
        })
    }
}

impl<S: Scalar + Float> Mesh<S> {
    /// Extracts the Voronoi diagram dual to this mesh.
    ///
    /// This is a read only pass: the mesh is not modified and stays usable
    /// afterwards. Triangles excluded by boundary loops contribute no Voronoi
    /// vertices; mesh vertices whose surrounding triangles are all excluded
    /// contribute no face.
    pub fn voronoi(&self) -> VoronoiDiagram<S> {
        VoronoiDiagram::from_mesh(self)
    }
}

/// Collects the included triangles around `vertex` in counter clockwise order,
/// treating excluded triangles like the outer face.
fn included_fan<S: Scalar + Float>(
    mesh: &Mesh<S>,
    start: FixedTriangleHandle,
    vertex: FixedVertexHandle,
) -> (Vec<FixedTriangleHandle>, bool) {
    let included = |t: Option<FixedTriangleHandle>| t.filter(|&t| !mesh.tri(t).excluded);

    let mut first = start;
    loop {
        match included(mesh.cw_around(first, vertex)) {
            Some(previous) if previous != start => first = previous,
            Some(_) => {
                first = start;
                break;
            }
            None => break,
        }
    }

    let mut fan = vec![first];
    let mut open = true;
    let mut current = first;
    loop {
        match included(mesh.ccw_around(current, vertex)) {
            Some(next) if next == first => {
                open = false;
                break;
            }
            Some(next) => {
                fan.push(next);
                current = next;
            }
            None => break,
        }
    }
    (fan, open)
}

fn rotate_cw<S: Scalar>(direction: Point2<S>) -> Point2<S> {
    Point2::new(direction.y, -direction.x)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utilities::{random_points_with_seed, SEED};
    use approx::assert_relative_eq;

    #[test]
    fn test_three_points() {
        let mesh = Mesh::bulk_load(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        let diagram = mesh.voronoi();

        // A single Delaunay triangle dualizes to one Voronoi vertex shared by three
        // unbounded faces.
        assert_eq!(diagram.num_vertices(), 1);
        assert_eq!(diagram.num_faces(), 3);
        assert_relative_eq!(diagram.vertex_position(0).x, 0.5);
        assert_relative_eq!(diagram.vertex_position(0).y, 0.5);

        let mut ray_count = 0;
        for face in diagram.faces() {
            assert!(face.is_unbounded());
            assert_eq!(face.boundary_indices().collect::<Vec<_>>(), vec![0]);
            ray_count += face.ray_directions().unwrap().len();
        }
        assert_eq!(ray_count, 6);

        // The corner cell at the right angle is bounded by rays along both
        // coordinate bisectors.
        let corner_face = diagram
            .faces()
            .find(|face| mesh.vertex(face.generator()).position() == Point2::new(0.0, 0.0))
            .unwrap();
        let [start_ray, end_ray] = corner_face.ray_directions().unwrap();
        assert_eq!(start_ray, Point2::new(0.0, -1.0));
        assert_eq!(end_ray, Point2::new(-1.0, 0.0));
    }

    #[test]
    fn test_duality() {
        let points = random_points_with_seed(50, SEED);
        let mesh = Mesh::bulk_load(points).unwrap();
        let diagram = mesh.voronoi();

        // One Voronoi vertex per triangle, equal to its circumcenter, in iteration
        // order.
        assert_eq!(diagram.num_vertices(), mesh.num_triangles());
        for (index, triangle) in mesh.triangles().enumerate() {
            assert_eq!(diagram.vertex_position(index), triangle.circumcenter());
        }
        // One face per vertex; none is excluded in an unconstrained mesh.
        assert_eq!(diagram.num_faces(), mesh.num_vertices());
        for face in diagram.faces() {
            assert!(face.boundary_indices().count() > 0);
        }

        // Each Voronoi edge between two adjacent circumcenters runs along the
        // perpendicular bisector of the shared Delaunay edge.
        for triangle in mesh.triangles() {
            let center = triangle.circumcenter();
            let vertices = triangle.vertices();
            for (edge_index, neighbor) in triangle.neighbors().into_iter().enumerate() {
                let Some(neighbor) = neighbor else { continue };
                let neighbor_center = mesh.triangle(neighbor).circumcenter();
                let voronoi_direction = neighbor_center.sub(center);

                let from = mesh.vertex(vertices[(edge_index + 1) % 3]).position();
                let to = mesh.vertex(vertices[(edge_index + 2) % 3]).position();
                let delaunay_direction = to.sub(from);

                let dot = voronoi_direction.dot(delaunay_direction).abs();
                let scale =
                    voronoi_direction.length2().sqrt() * delaunay_direction.length2().sqrt();
                assert!(dot <= scale * 1.0e-9, "voronoi edge is not a bisector");
            }
        }
    }

    #[test]
    fn test_voronoi_is_deterministic() {
        let points = random_points_with_seed(40, SEED);
        let mesh = Mesh::bulk_load(points).unwrap();

        let first = mesh.voronoi();
        let second = mesh.voronoi();

        assert_eq!(first.vertices, second.vertices);
        assert_eq!(first.faces.len(), second.faces.len());
        for (a, b) in first.faces.iter().zip(&second.faces) {
            assert_eq!(a.generator, b.generator);
            assert_eq!(a.boundary, b.boundary);
            assert_eq!(a.rays, b.rays);
        }
    }

    #[test]
    fn test_interior_faces_are_bounded() {
        let mut points = vec![Point2::new(0.0, 0.0)];
        let count = 8;
        for index in 0..count {
            let angle = std::f64::consts::TAU * index as f64 / count as f64;
            points.push(Point2::new(2.0 * angle.cos(), 2.0 * angle.sin()));
        }
        let mesh = Mesh::bulk_load(points).unwrap();
        let diagram = mesh.voronoi();

        let center_face = diagram
            .faces()
            .find(|face| mesh.vertex(face.generator()).position() == Point2::new(0.0, 0.0))
            .unwrap();
        assert!(!center_face.is_unbounded());
        assert_eq!(center_face.ray_directions(), None);
        // The closed cell around the center has as many edges as boundary vertices.
        assert_eq!(
            center_face.edges().count(),
            center_face.boundary_vertices().count()
        );

        let hull_faces = diagram.faces().filter(|face| face.is_unbounded()).count();
        assert_eq!(hull_faces, count);
    }

    #[test]
    fn test_hole_vertices_have_no_face() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        let hole = vec![
            Point2::new(4.0, 4.0),
            Point2::new(6.0, 4.0),
            Point2::new(6.0, 6.0),
            Point2::new(4.0, 6.0),
        ];
        // One point strictly inside the hole - it gets triangulated but excluded.
        let mesh =
            Mesh::bulk_load_constrained(vec![Point2::new(5.0, 5.0)], &[outer, hole]).unwrap();
        let diagram = mesh.voronoi();

        assert_eq!(diagram.num_vertices(), mesh.num_triangles());
        let buried = mesh
            .vertices()
            .find(|v| v.position() == Point2::new(5.0, 5.0))
            .unwrap()
            .fix();
        assert!(diagram.faces().all(|face| face.generator() != buried));
    }
}
