use glam::Vec3;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// CPU-side index list: triangles for faces, pairs for edges.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl Geometry {
    /// Appends a quad facing `normal`; `u x v` must equal `normal` for CCW winding.
    fn push_quad(&mut self, center: Vec3, normal: Vec3, u: Vec3, v: Vec3) {
        let base = self.vertices.len() as u16;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            self.vertices.push(Vertex {
                position: (center + u * su + v * sv).to_array(),
                normal: normal.to_array(),
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Unit cube centred on the origin, one quad per face.
pub fn unit_box() -> Geometry {
    let mut geometry = Geometry::default();
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    for (normal, u, v) in faces {
        geometry.push_quad(normal * 0.5, normal, u, v);
    }
    geometry
}

/// Unit square in the XZ plane facing +Y.
pub fn unit_plane() -> Geometry {
    let mut geometry = Geometry::default();
    geometry.push_quad(Vec3::ZERO, Vec3::Y, Vec3::Z, Vec3::X);
    geometry
}

/// The 12 edges of the unit cube as a line list over its 8 corners.
pub fn unit_box_edges() -> Geometry {
    let corner = |bits: u16| {
        let axis = |bit: u16| if bits & bit == 0 { -0.5 } else { 0.5 };
        Vertex {
            position: [axis(1), axis(2), axis(4)],
            // Unlit; any unit normal keeps the vertex stage finite.
            normal: [0.0, 1.0, 0.0],
        }
    };
    let mut geometry = Geometry {
        vertices: (0..8).map(corner).collect(),
        indices: Vec::with_capacity(24),
    };
    for from in 0..8u16 {
        for bit in [1, 2, 4] {
            if from & bit == 0 {
                geometry.indices.extend_from_slice(&[from, from | bit]);
            }
        }
    }
    geometry
}

pub struct Mesh {
    pub num_indices: u32,
    pub vert_buf: wgpu::Buffer,
    pub ind_buf: wgpu::Buffer,
}

impl Mesh {
    pub fn upload(device: &wgpu::Device, label: &str, geometry: &Geometry) -> Self {
        let vert_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertices")),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ind_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_indices")),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            num_indices: geometry.indices.len() as u32,
            vert_buf,
            ind_buf,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vert_buf.slice(..));
        pass.set_index_buffer(self.ind_buf.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }

    pub fn destroy(&self) {
        self.vert_buf.destroy();
        self.ind_buf.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_faces_wind_counter_clockwise_outward() {
        let geometry = unit_box();
        assert_eq!(geometry.vertices.len(), 24);
        assert_eq!(geometry.indices.len(), 36);

        for tri in geometry.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| {
                Vec3::from(geometry.vertices[usize::from(i)].position)
            });
            let normal = Vec3::from(geometry.vertices[usize::from(tri[0])].normal);
            let face = (b - a).cross(c - a).normalize();
            assert!(face.abs_diff_eq(normal, 1e-6), "{face} vs {normal}");
            assert!(a.dot(normal) > 0.0);
        }
    }

    #[test]
    fn box_spans_unit_extent() {
        let geometry = unit_box();
        for vertex in &geometry.vertices {
            for component in vertex.position {
                assert_eq!(component.abs(), 0.5);
            }
        }
    }

    #[test]
    fn box_edges_trace_the_cube() {
        let geometry = unit_box_edges();
        assert_eq!(geometry.vertices.len(), 8);
        assert_eq!(geometry.indices.len(), 24);

        let mut seen = std::collections::HashSet::new();
        for pair in geometry.indices.chunks(2) {
            let [a, b] = [pair[0], pair[1]]
                .map(|i| Vec3::from(geometry.vertices[usize::from(i)].position));
            for corner in [a, b] {
                assert!(corner.to_array().iter().all(|c| c.abs() == 0.5), "{corner}");
            }
            let along = (b - a).abs();
            assert_eq!(along.element_sum(), 1.0, "{a} -> {b} is not an edge");
            assert_eq!(along.max_element(), 1.0);
            assert!(seen.insert((pair[0].min(pair[1]), pair[0].max(pair[1]))));
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn plane_faces_up() {
        let geometry = unit_plane();
        let [a, b, c] = [0, 1, 2].map(|i: usize| Vec3::from(geometry.vertices[i].position));
        assert!((b - a).cross(c - a).normalize().abs_diff_eq(Vec3::Y, 1e-6));
    }
}
