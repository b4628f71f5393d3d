//! Renders a refined, constrained mesh and its Voronoi diagram to `terrain.svg`.
//!
//! This mirrors how a map generator would use the crate: one mesh per region,
//! well shaped cells, holes for areas that stay untriangulated.

use anyhow::Result;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use svg::node::element::{Group, Line, Polygon};
use svg::Document;

use trowel::{build_constrained_mesh, Mesh, Point2, VoronoiDiagram};

fn main() -> Result<()> {
    let outer = vec![
        Point2::new(0.0, 0.0),
        Point2::new(100.0, 0.0),
        Point2::new(100.0, 100.0),
        Point2::new(0.0, 100.0),
    ];
    let hole = vec![
        Point2::new(40.0, 40.0),
        Point2::new(60.0, 40.0),
        Point2::new(60.0, 60.0),
        Point2::new(40.0, 60.0),
    ];

    let mut rng = rand::rngs::StdRng::from_seed(*b"trowel-svg-export-demo-seed-0001");
    let coordinate = Uniform::new(2.0, 98.0);
    let points: Vec<_> = (0..120)
        .map(|_| Point2::new(coordinate.sample(&mut rng), coordinate.sample(&mut rng)))
        .collect();

    let mesh = build_constrained_mesh(points, &[outer, hole], 25.0)?;
    let voronoi = mesh.voronoi();

    let document = Document::new()
        .set("viewBox", (-5, -5, 110, 110))
        .add(triangle_layer(&mesh))
        .add(voronoi_layer(&voronoi));
    svg::save("terrain.svg", &document)?;

    println!(
        "terrain.svg: {} triangles, {} voronoi faces",
        mesh.num_triangles(),
        voronoi.num_faces()
    );
    Ok(())
}

fn triangle_layer(mesh: &Mesh<f64>) -> Group {
    let mut group = Group::new()
        .set("stroke", "#97b287")
        .set("stroke-width", 0.2)
        .set("fill", "#e8f0e2");
    for triangle in mesh.triangles() {
        let corners: Vec<String> = triangle
            .positions()
            .iter()
            .map(|p| format!("{:.3},{:.3}", p.x, p.y))
            .collect();
        group = group.add(Polygon::new().set("points", corners.join(" ")));
    }
    group
}

fn voronoi_layer(diagram: &VoronoiDiagram<f64>) -> Group {
    let mut group = Group::new().set("stroke", "#51657d").set("stroke-width", 0.35);
    for face in diagram.faces() {
        for [from, to] in face.edges() {
            group = group.add(
                Line::new()
                    .set("x1", from.x)
                    .set("y1", from.y)
                    .set("x2", to.x)
                    .set("y2", to.y),
            );
        }
        if let Some([start_ray, end_ray]) = face.ray_directions() {
            let boundary: Vec<_> = face.boundary_vertices().collect();
            for (origin, direction) in [
                (boundary[0], start_ray),
                (boundary[boundary.len() - 1], end_ray),
            ] {
                let length = (direction.x * direction.x + direction.y * direction.y).sqrt();
                group = group.add(
                    Line::new()
                        .set("x1", origin.x)
                        .set("y1", origin.y)
                        .set("x2", origin.x + direction.x / length * 8.0)
                        .set("y2", origin.y + direction.y / length * 8.0)
                        .set("stroke-dasharray", "1,1"),
                );
            }
        }
    }
    group
}
