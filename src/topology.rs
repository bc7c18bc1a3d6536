//! Assembly of primitives from vertex streams
use crate::{LinePrimitive, PointPrimitive, Primitive, Scalar, Scene, TrianglePrimitive, Vertex};

/// How a vertex stream is split into primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// Consecutive primitives share vertices
    pub fn is_strip(self) -> bool {
        matches!(
            self,
            Topology::LineStrip | Topology::TriangleStrip | Topology::TriangleFan
        )
    }
}

/// Vertex of a primitive providing flat shaded attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProvokingVertex {
    #[default]
    First,
    Last,
}

/// Split vertex stream into primitives
///
/// Trailing vertices that do not form a complete primitive are ignored. Edges
/// between consecutive triangles of strips and fans are flagged as shared.
pub fn assemble(
    vertices: &[Vertex],
    topology: Topology,
    provoking: ProvokingVertex,
) -> Vec<Primitive> {
    let last = provoking == ProvokingVertex::Last;
    match topology {
        Topology::PointList => vertices
            .iter()
            .map(|vertex| Primitive::Point(PointPrimitive { vertex: *vertex }))
            .collect(),
        Topology::LineList => vertices
            .chunks_exact(2)
            .map(|pair| line(pair[0], pair[1], last))
            .collect(),
        Topology::LineStrip => vertices
            .windows(2)
            .map(|pair| line(pair[0], pair[1], last))
            .collect(),
        Topology::TriangleList => vertices
            .chunks_exact(3)
            .map(|triple| {
                let triangle = TrianglePrimitive::new([triple[0], triple[1], triple[2]]);
                Primitive::Triangle(triangle.with_provoking(if last { 2 } else { 0 }))
            })
            .collect(),
        Topology::TriangleStrip => {
            let count = vertices.len().saturating_sub(2);
            (0..count)
                .map(|index| {
                    let has_next = index + 1 < count;
                    let odd = index % 2 == 1;
                    let order = [index, index + 1 + index % 2, index + 2 - index % 2];
                    let shared = if odd {
                        [false, has_next, index > 0]
                    } else {
                        [index > 0, has_next, false]
                    };
                    // last vertex of the stream is `index + 2` wherever it lands
                    let provoking = match (last, odd) {
                        (false, _) => 0,
                        (true, false) => 2,
                        (true, true) => 1,
                    };
                    Primitive::Triangle(
                        TrianglePrimitive::new(order.map(|index| vertices[index]))
                            .with_shared_edges(shared)
                            .with_provoking(provoking),
                    )
                })
                .collect()
        }
        Topology::TriangleFan => {
            let count = vertices.len().saturating_sub(2);
            (0..count)
                .map(|index| {
                    let has_next = index + 1 < count;
                    Primitive::Triangle(
                        TrianglePrimitive::new([
                            vertices[index + 1],
                            vertices[index + 2],
                            vertices[0],
                        ])
                        .with_shared_edges([false, has_next, index > 0])
                        .with_provoking(if last { 1 } else { 0 }),
                    )
                })
                .collect()
        }
    }
}

fn line(a: Vertex, b: Vertex, last: bool) -> Primitive {
    Primitive::Line(LinePrimitive::new([a, b]).with_provoking(if last { 1 } else { 0 }))
}

impl Scene {
    /// Scene with primitives assembled from the vertex stream
    pub fn from_topology(
        vertices: &[Vertex],
        topology: Topology,
        provoking: ProvokingVertex,
    ) -> Self {
        Scene::new(assemble(vertices, topology, provoking)).with_strip(topology.is_strip())
    }
}

/// Winding of front facing triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Triangles discarded before rasterization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Signed area of the triangle after perspective divide with `y` pointing down,
/// positive for counter-clockwise winding
pub fn signed_area(triangle: &TrianglePrimitive) -> Scalar {
    let points = triangle
        .vertices
        .map(|vertex| [vertex.position[0] / vertex.w(), vertex.position[1] / vertex.w()]);
    let mut sum = 0.0;
    for index in 0..3 {
        let [x0, y0] = points[index];
        let [x1, y1] = points[(index + 1) % 3];
        sum += x0 * y1 - x1 * y0;
    }
    -sum / 2.0
}

/// Remove culled triangles, other primitives are never culled
///
/// Zero area triangles have no facing and are only removed by [`CullMode::FrontAndBack`].
pub fn cull(primitives: Vec<Primitive>, mode: CullMode, front_face: FrontFace) -> Vec<Primitive> {
    if mode == CullMode::None {
        return primitives;
    }
    primitives
        .into_iter()
        .filter(|primitive| {
            let Primitive::Triangle(triangle) = primitive else {
                return true;
            };
            if mode == CullMode::FrontAndBack {
                return false;
            }
            let area = signed_area(triangle);
            if area == 0.0 {
                return true;
            }
            let front = (area > 0.0) == (front_face == FrontFace::CounterClockwise);
            match mode {
                CullMode::Front => !front,
                CullMode::Back => front,
                CullMode::None | CullMode::FrontAndBack => true,
            }
        })
        .collect()
}

/// Triangles drawn with line polygon mode, one line per edge
pub fn polygon_lines(primitives: &[Primitive]) -> Vec<Primitive> {
    let mut lines = Vec::new();
    for primitive in primitives {
        match primitive {
            Primitive::Triangle(triangle) => {
                let [a, b, c] = triangle.vertices;
                for (index, (start, end)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
                    let provoking = if triangle.provoking == index { 0 } else { 1 };
                    lines.push(Primitive::Line(
                        LinePrimitive::new([start, end]).with_provoking(provoking),
                    ));
                }
            }
            other => lines.push(*other),
        }
    }
    lines
}

/// Primitives drawn with point polygon mode, one point per vertex
pub fn polygon_points(primitives: &[Primitive]) -> Vec<Primitive> {
    primitives
        .iter()
        .flat_map(|primitive| primitive.vertices().to_vec())
        .map(|vertex| Primitive::Point(PointPrimitive { vertex }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CoordinateSpace, Error, ImageOwned, PrimitiveKind, RGBA, Size, VerificationArguments,
        render_reference, verify_triangle_group,
    };

    fn stream(count: usize) -> Vec<Vertex> {
        (0..count)
            .map(|index| Vertex::xy(index as Scalar, (index % 2) as Scalar))
            .collect()
    }

    fn triangles(primitives: &[Primitive]) -> Vec<TrianglePrimitive> {
        primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::Triangle(triangle) => Some(*triangle),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lists() {
        let vertices = stream(7);
        assert_eq!(assemble(&vertices, Topology::PointList, ProvokingVertex::First).len(), 7);
        let lines = assemble(&vertices, Topology::LineList, ProvokingVertex::Last);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].provoking_vertex(), &vertices[1]);
        assert_eq!(assemble(&vertices, Topology::LineStrip, ProvokingVertex::First).len(), 6);
        let list = assemble(&vertices, Topology::TriangleList, ProvokingVertex::Last);
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].provoking_vertex(), &vertices[5]);
        assert!(triangles(&list).iter().all(|t| t.shared_edges == [false; 3]));
    }

    #[test]
    fn test_triangle_strip() {
        let vertices = stream(5);
        let strip = triangles(&assemble(
            &vertices,
            Topology::TriangleStrip,
            ProvokingVertex::First,
        ));
        assert_eq!(strip.len(), 3);
        assert_eq!(strip[0].vertices, [vertices[0], vertices[1], vertices[2]]);
        assert_eq!(strip[1].vertices, [vertices[1], vertices[3], vertices[2]]);
        assert_eq!(strip[2].vertices, [vertices[2], vertices[3], vertices[4]]);
        assert_eq!(strip[0].shared_edges, [false, true, false]);
        assert_eq!(strip[1].shared_edges, [false, true, true]);
        assert_eq!(strip[2].shared_edges, [true, false, false]);

        let strip = assemble(&vertices, Topology::TriangleStrip, ProvokingVertex::Last);
        for (index, primitive) in strip.iter().enumerate() {
            assert_eq!(primitive.provoking_vertex(), &vertices[index + 2]);
        }
    }

    #[test]
    fn test_triangle_fan() {
        let vertices = stream(5);
        let fan = assemble(&vertices, Topology::TriangleFan, ProvokingVertex::Last);
        let fan_triangles = triangles(&fan);
        assert_eq!(fan_triangles.len(), 3);
        assert_eq!(fan_triangles[1].vertices, [vertices[2], vertices[3], vertices[0]]);
        assert_eq!(fan_triangles[0].shared_edges, [false, true, false]);
        assert_eq!(fan_triangles[2].shared_edges, [false, false, true]);
        assert_eq!(fan[2].provoking_vertex(), &vertices[4]);
        assert!(assemble(&vertices[..2], Topology::TriangleFan, ProvokingVertex::First).is_empty());
    }

    #[test]
    fn test_strip_square() -> Result<(), Error> {
        let vertices = [
            Vertex::xy(-1.0, -1.0),
            Vertex::xy(1.0, -1.0),
            Vertex::xy(-1.0, 1.0),
            Vertex::xy(1.0, 1.0),
        ];
        let scene =
            Scene::from_topology(&vertices, Topology::TriangleStrip, ProvokingVertex::First);
        assert!(scene.is_strip);
        assert_eq!(scene.kind(), Some(PrimitiveKind::Triangle));
        let args = VerificationArguments::new(8, [8, 8, 8]);
        let white = ImageOwned::new_with(8, 8, |_, _| RGBA::new(255, 255, 255, 255));
        assert_eq!(render_reference(&scene, &args, Size::new(8, 8))?, white);
        assert!(verify_triangle_group(&white, &scene, &args)?.is_pass());
        Ok(())
    }

    #[test]
    fn test_cull() {
        // clockwise on screen with `y` pointing down
        let clockwise = TrianglePrimitive::new([
            Vertex::xy(-1.0, -1.0),
            Vertex::xy(1.0, -1.0),
            Vertex::xy(-1.0, 1.0),
        ]);
        assert!(signed_area(&clockwise) < 0.0);
        let [a, b, c] = clockwise.vertices;
        let counter = TrianglePrimitive::new([a, c, b]);
        let degenerate = TrianglePrimitive::new([a, a, b]);
        let point = Primitive::Point(PointPrimitive { vertex: a });
        let primitives = vec![
            Primitive::Triangle(clockwise),
            Primitive::Triangle(counter),
            Primitive::Triangle(degenerate),
            point,
        ];
        let ccw = FrontFace::CounterClockwise;
        assert_eq!(cull(primitives.clone(), CullMode::None, ccw).len(), 4);
        let back = cull(primitives.clone(), CullMode::Back, ccw);
        assert_eq!(back, vec![primitives[1], primitives[2], point]);
        let front = cull(primitives.clone(), CullMode::Front, ccw);
        assert_eq!(front, vec![primitives[0], primitives[2], point]);
        let front = cull(primitives.clone(), CullMode::Front, FrontFace::Clockwise);
        assert_eq!(front, vec![primitives[1], primitives[2], point]);
        assert_eq!(cull(primitives, CullMode::FrontAndBack, ccw), vec![point]);
    }

    #[test]
    fn test_polygon_mode() {
        let vertices = stream(6);
        let list = assemble(&vertices, Topology::TriangleList, ProvokingVertex::First);
        let lines = polygon_lines(&list);
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|line| line.kind() == PrimitiveKind::Line));
        assert_eq!(lines[2].vertices(), &[vertices[2], vertices[0]]);
        assert_eq!(lines[0].provoking_vertex(), &vertices[0]);
        assert_eq!(lines[2].provoking_vertex(), &vertices[0]);

        let points = polygon_points(&list);
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|point| point.kind() == PrimitiveKind::Point));

        let scene = Scene::new(lines).with_coordinates(CoordinateSpace::Window);
        assert_eq!(scene.validate().ok().flatten(), Some(PrimitiveKind::Line));
    }
}
