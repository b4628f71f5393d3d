#![allow(missing_docs)]
use crate::mesh_core::math;
use crate::{Mesh, Point2};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;

pub const SEED: &[u8; 32] = b"kQx7PbeLc20ZDh54TgrWJvYAoNs91BuF";

pub fn random_points_in_range(range: f64, size: usize, seed: &[u8; 32]) -> Vec<Point2<f64>> {
    let mut rng = rand::rngs::StdRng::from_seed(*seed);
    let range = Uniform::new(-range, range);
    let mut points = Vec::with_capacity(size);
    for _ in 0..size {
        let x = range.sample(&mut rng);
        let y = range.sample(&mut rng);
        points.push(Point2::new(x, y));
    }
    points
}

pub fn random_points_with_seed(size: usize, seed: &[u8; 32]) -> Vec<Point2<f64>> {
    random_points_in_range(1.0, size, seed)
}

/// Asserts the Delaunay property of an unconstrained mesh: no vertex lies strictly
/// inside any triangle's circumcircle.
pub fn assert_delaunay(mesh: &Mesh<f64>) {
    for triangle in mesh.triangles() {
        let [v0, v1, v2] = triangle.positions();
        for vertex in mesh.vertices() {
            assert!(
                !math::contained_in_circumference(v0, v1, v2, vertex.position()),
                "vertex {:?} violates the circumcircle of {:?}",
                vertex.position(),
                triangle.positions()
            );
        }
    }
}

/// Returns the smallest interior angle of a triangle, in degrees.
pub fn min_angle_deg(positions: [Point2<f64>; 3]) -> f64 {
    let mut smallest = f64::INFINITY;
    for index in 0..3 {
        let a = positions[index];
        let b = positions[(index + 1) % 3];
        let c = positions[(index + 2) % 3];
        let u = b.sub(a);
        let w = c.sub(a);
        let angle = (u.dot(w) / (u.length2().sqrt() * w.length2().sqrt()))
            .clamp(-1.0, 1.0)
            .acos();
        smallest = smallest.min(angle.to_degrees());
    }
    smallest
}
