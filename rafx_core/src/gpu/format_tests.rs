use super::*;

#[test]
fn test_depth_formats() {
    assert!(Format::D32_FLOAT.is_depth());
    assert!(Format::D24_UNORM_S8_UINT.is_depth());
    assert!(!Format::R8G8B8A8_UNORM.is_depth());
    assert!(!Format::R32_SFLOAT.is_depth());
}

#[test]
fn test_depth_formats_are_not_color_renderable() {
    assert!(!Format::D32_FLOAT.is_color_renderable());
    assert!(!Format::D16_UNORM.is_color_renderable());
    assert!(Format::B8G8R8A8_SRGB.is_color_renderable());
}

#[test]
fn test_vertex_only_formats() {
    assert!(!Format::R32G32B32_SFLOAT.is_texture_format());
    assert!(!Format::R32G32B32_SFLOAT.is_color_renderable());
    assert!(Format::R32G32B32A32_SFLOAT.is_texture_format());
}

#[test]
fn test_vertex_position_normal_stride() {
    // Interleaved position + normal vertex
    assert_eq!(Format::R32G32B32_SFLOAT.size_bytes() * 2, 24);
    assert_eq!(Format::R32G32B32_SFLOAT.component_count(), 3);
}

#[test]
fn test_aspect_from_format() {
    assert_eq!(Format::D32_FLOAT.aspect(), TextureAspect::Depth);
    assert_eq!(Format::D24_UNORM_S8_UINT.aspect(), TextureAspect::DepthStencil);
    assert_eq!(Format::R8G8B8A8_SRGB.aspect(), TextureAspect::Color);
}
