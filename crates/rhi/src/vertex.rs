//! Vertex layout for the static triangle.
//!
//! [`TriangleVertex`] matches the vertex shader inputs:
//! - location 0: position (vec3)
//! - location 1: color (vec4)

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex with a clip-space position and an RGBA color.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: color (16 bytes)
/// - Total size: 28 bytes
///
/// `color` stays a plain array; a 16-byte aligned `Vec4` would insert padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TriangleVertex {
    pub position: Vec3,
    pub color: [f32; 4],
}

impl TriangleVertex {
    /// Creates a new triangle vertex.
    #[inline]
    pub const fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// The three vertices drawn every frame: red top, green right, blue left.
    pub const TRIANGLE: [TriangleVertex; 3] = [
        TriangleVertex::new(Vec3::new(0.0, 0.5, 0.0), [1.0, 0.0, 0.0, 1.0]),
        TriangleVertex::new(Vec3::new(0.5, -0.5, 0.0), [0.0, 1.0, 0.0, 1.0]),
        TriangleVertex::new(Vec3::new(-0.5, -0.5, 0.0), [0.0, 0.0, 1.0, 1.0]),
    ];

    /// Get the vertex input binding description.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Self, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: std::mem::offset_of!(Self, color) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_vertex_size() {
        // Vec3 (12) + [f32; 4] (16), no padding
        assert_eq!(std::mem::size_of::<TriangleVertex>(), 28);
        assert_eq!(std::mem::align_of::<TriangleVertex>(), 4);
        assert_eq!(std::mem::offset_of!(TriangleVertex, color), 12);
    }

    #[test]
    fn test_triangle_vertex_binding_description() {
        let binding = TriangleVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 28);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_triangle_vertex_attribute_descriptions() {
        let attrs = TriangleVertex::attribute_descriptions();

        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);

        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(attrs[1].offset, 12);
    }

    #[test]
    fn test_triangle_colors() {
        let [top, right, left] = TriangleVertex::TRIANGLE;
        assert_eq!(top.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(right.color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(left.color, [0.0, 0.0, 1.0, 1.0]);
        assert!(top.position.y > right.position.y);
    }

    #[test]
    fn test_triangle_bytes() {
        let bytes: &[u8] = bytemuck::cast_slice(&TriangleVertex::TRIANGLE);
        assert_eq!(bytes.len(), 3 * 28);

        // Second vertex starts right after the first one's alpha
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(&floats[3..7], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&floats[7..10], &[0.5, -0.5, 0.0]);
    }
}
