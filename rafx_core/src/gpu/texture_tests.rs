use super::*;

fn shadow_map_desc() -> TextureDesc {
    TextureDesc::new_2d(
        2048,
        2048,
        Format::D32_FLOAT,
        TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
    )
}

#[test]
fn test_shadow_map_desc_is_valid() {
    assert!(shadow_map_desc().validate(None).is_ok());
}

#[test]
fn test_zero_dimension_is_rejected() {
    let mut desc = shadow_map_desc();
    desc.width = 0;
    assert!(matches!(desc.validate(None), Err(ResourceError::InvalidDescription(_))));
}

#[test]
fn test_depth_format_as_color_target_is_rejected() {
    let desc = TextureDesc::new_2d(4, 4, Format::D32_FLOAT, TextureUsage::COLOR_TARGET);
    assert!(matches!(
        desc.validate(None),
        Err(ResourceError::UnsupportedUsageCombination(_))
    ));
}

#[test]
fn test_color_format_as_depth_target_is_rejected() {
    let desc = TextureDesc::new_2d(4, 4, Format::R8G8B8A8_UNORM, TextureUsage::DEPTH_STENCIL);
    assert!(matches!(
        desc.validate(None),
        Err(ResourceError::UnsupportedUsageCombination(_))
    ));
}

#[test]
fn test_vertex_only_format_is_unsupported() {
    let desc = TextureDesc::new_2d(4, 4, Format::R32G32B32_SFLOAT, TextureUsage::SHADER_RESOURCE);
    assert_eq!(
        desc.validate(None),
        Err(ResourceError::UnsupportedFormat(Format::R32G32B32_SFLOAT))
    );
}

#[test]
fn test_initial_data_size_must_match() {
    let desc = TextureDesc::new_2d(2, 2, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
    assert!(desc.validate(Some(&[0u8; 16])).is_ok());
    assert!(desc.validate(Some(&[0u8; 15])).is_err());
}

#[test]
fn test_initial_data_requires_shader_resource() {
    let desc = TextureDesc::new_2d(2, 2, Format::R8G8B8A8_UNORM, TextureUsage::COLOR_TARGET);
    assert!(desc.validate(None).is_ok());
    assert!(matches!(
        desc.validate(Some(&[0u8; 16])),
        Err(ResourceError::UnsupportedUsageCombination(_))
    ));
}

#[test]
fn test_data_size() {
    let desc = TextureDesc::new_2d(4, 2, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
    assert_eq!(desc.data_size(), Some(32));
}

#[test]
fn test_oversized_texture_is_invalid_instead_of_overflowing() {
    let mut desc = TextureDesc::new_2d(u32::MAX, u32::MAX, Format::R32G32B32A32_SFLOAT, TextureUsage::SHADER_RESOURCE);
    desc.depth = u32::MAX;
    assert_eq!(desc.data_size(), None);
    assert!(matches!(desc.validate(None), Err(ResourceError::InvalidDescription(_))));
}
