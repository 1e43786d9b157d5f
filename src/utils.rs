use wgpu::util::DeviceExt;
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffer {
    /// Overwrite vertex data in place (same vertex count as uploaded)
    pub fn write_vertices(&self, queue: &wgpu::Queue, vertices: &[Vertex]) {
        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Replace normals with area-weighted face normals
    pub fn compute_normals(&mut self) {
        for v in self.vertices.iter_mut() {
            v.normal = [0.0; 3];
        }
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= self.vertices.len() || b >= self.vertices.len() || c >= self.vertices.len() {
                continue;
            }
            let pa = glam::Vec3::from(self.vertices[a].pos);
            let pb = glam::Vec3::from(self.vertices[b].pos);
            let pc = glam::Vec3::from(self.vertices[c].pos);
            let n = (pb - pa).cross(pc - pa);
            for i in [a, b, c] {
                let acc = glam::Vec3::from(self.vertices[i].normal) + n;
                self.vertices[i].normal = acc.to_array();
            }
        }
        for v in self.vertices.iter_mut() {
            v.normal = glam::Vec3::from(v.normal).normalize_or_zero().to_array();
        }
    }

    /// Upload to the GPU. `dynamic` vertex buffers can be rewritten every frame.
    pub fn upload(&self, device: &wgpu::Device, dynamic: bool) -> MeshBuffer {
        let mut vertex_usage = wgpu::BufferUsages::VERTEX;
        if dynamic {
            vertex_usage |= wgpu::BufferUsages::COPY_DST;
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: vertex_usage,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_compute_normals_ccw_triangle_faces_plus_z() {
        let v = |x: f32, y: f32| Vertex { pos: [x, y, 0.0], normal: [0.0; 3], uv: [0.0; 2] };
        let mut mesh = Mesh {
            vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)],
            indices: vec![0, 1, 2],
        };
        mesh.compute_normals();
        for vert in &mesh.vertices {
            assert_eq!(vert.normal, [0.0, 0.0, 1.0]);
        }
    }
}
