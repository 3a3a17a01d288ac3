//! Unit tests for registry.rs
//!
//! Drives the registry directly against the headless device: creation
//! validation, bindless IDs, deferred destruction and CPU writes.

use super::*;
use crate::error::Error;
use crate::gpu::{BufferUsage, MemoryLocation};
use crate::headless::{HeadlessConfig, HeadlessDevice, HeadlessEvent};

fn setup() -> (HeadlessDevice, ResourceRegistry<HeadlessDevice>) {
    let device = HeadlessDevice::default();
    let registry = ResourceRegistry::new(device.capabilities().max_bindless_textures);
    (device, registry)
}

fn shadow_map_desc() -> TextureDesc {
    TextureDesc::new_2d(
        2048,
        2048,
        Format::D32_FLOAT,
        TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
    )
    .with_name("ShadowMap")
}

// ============================================================================
// BUFFER CREATION
// ============================================================================

#[test]
fn test_create_buffer_records_info() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::gpu_only(240, 24, BufferUsage::VERTEX).with_name("Cubes");
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();

    let info = registry.buffer_info(handle).unwrap();
    assert_eq!(info.size, 240);
    assert_eq!(info.stride, 24);
    assert_eq!(info.memory, MemoryLocation::GpuOnly);
    assert_eq!(info.debug_name.as_deref(), Some("Cubes"));
    assert_eq!(registry.live_buffer_count(), 1);
    assert!(device
        .events()
        .iter()
        .any(|e| matches!(e, HeadlessEvent::DebugName { name, .. } if name == "Cubes")));
}

#[test]
fn test_create_buffer_zero_size_fails() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::gpu_only(0, 0, BufferUsage::VERTEX);
    let result = registry.create_buffer(&mut device, &desc, None);
    assert!(matches!(result, Err(Error::Resource(ResourceError::InvalidDescription(_)))));
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_create_buffer_over_budget_is_out_of_memory() {
    let mut device = HeadlessDevice::new(HeadlessConfig {
        memory_budget: 1024,
        ..Default::default()
    });
    let mut registry = ResourceRegistry::<HeadlessDevice>::new(16);
    let desc = BufferDesc::gpu_only(4096, 0, BufferUsage::VERTEX);
    let result = registry.create_buffer(&mut device, &desc, None);
    assert_eq!(
        result.unwrap_err(),
        Error::Resource(ResourceError::OutOfDeviceMemory { requested: 4096 })
    );
}

#[test]
fn test_gpu_only_upload_stores_ticket() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::gpu_only(4, 0, BufferUsage::INDEX);
    let handle = registry.create_buffer(&mut device, &desc, Some(&[1, 2, 3, 4])).unwrap();
    let (_, ticket) = registry.use_buffer(handle, 1).unwrap();
    assert_eq!(ticket, Some(1));
}

// ============================================================================
// TEXTURE CREATION
// ============================================================================

#[test]
fn test_shader_resource_texture_gets_bindless_id() {
    let (mut device, mut registry) = setup();
    let handle = registry.create_texture(&mut device, &shadow_map_desc(), None).unwrap();

    let id = registry.texture_id(handle).unwrap();
    assert_eq!(id, 0);
    assert_eq!(registry.bindless_slots_in_use(), 1);
    assert!(device.bindless_slot(id).is_some());
    assert_eq!(registry.texture_format(handle).unwrap(), Format::D32_FLOAT);
    assert_eq!(registry.texture_dimensions(handle).unwrap(), (2048, 2048, 1));
    assert_eq!(registry.texture_info(handle).unwrap().state, ResourceState::Undefined);
}

#[test]
fn test_texture_without_shader_resource_has_no_id() {
    let (mut device, mut registry) = setup();
    let desc = TextureDesc::new_2d(64, 64, Format::D32_FLOAT, TextureUsage::DEPTH_STENCIL);
    let handle = registry.create_texture(&mut device, &desc, None).unwrap();
    assert!(matches!(
        registry.texture_id(handle),
        Err(Error::Resource(ResourceError::UnsupportedUsageCombination(_)))
    ));
    assert_eq!(registry.bindless_slots_in_use(), 0);
}

#[test]
fn test_depth_format_as_color_target_is_rejected() {
    let (mut device, mut registry) = setup();
    let desc = TextureDesc::new_2d(64, 64, Format::D32_FLOAT, TextureUsage::COLOR_TARGET);
    assert!(matches!(
        registry.create_texture(&mut device, &desc, None),
        Err(Error::Resource(ResourceError::UnsupportedUsageCombination(_)))
    ));
}

#[test]
fn test_device_unsupported_format_is_rejected() {
    let mut device = HeadlessDevice::new(HeadlessConfig {
        unsupported_formats: vec![Format::R16G16B16A16_SFLOAT],
        ..Default::default()
    });
    let mut registry = ResourceRegistry::<HeadlessDevice>::new(16);
    let desc = TextureDesc::new_2d(8, 8, Format::R16G16B16A16_SFLOAT, TextureUsage::SHADER_RESOURCE);
    assert_eq!(
        registry.create_texture(&mut device, &desc, None).unwrap_err(),
        Error::Resource(ResourceError::UnsupportedFormat(Format::R16G16B16A16_SFLOAT))
    );
    assert_eq!(registry.bindless_slots_in_use(), 0);
}

#[test]
fn test_bindless_table_full() {
    let (mut device, _) = setup();
    let mut registry = ResourceRegistry::<HeadlessDevice>::new(2);
    let desc = TextureDesc::new_2d(4, 4, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
    registry.create_texture(&mut device, &desc, None).unwrap();
    registry.create_texture(&mut device, &desc, None).unwrap();
    assert_eq!(
        registry.create_texture(&mut device, &desc, None).unwrap_err(),
        Error::Resource(ResourceError::BindlessTableFull { capacity: 2 })
    );
}

#[test]
fn test_failed_device_creation_returns_bindless_slot() {
    let mut device = HeadlessDevice::new(HeadlessConfig {
        memory_budget: 16,
        ..Default::default()
    });
    let mut registry = ResourceRegistry::<HeadlessDevice>::new(4);
    let desc = TextureDesc::new_2d(64, 64, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
    assert!(registry.create_texture(&mut device, &desc, None).is_err());
    assert_eq!(registry.bindless_slots_in_use(), 0);
}

#[test]
fn test_uploaded_texture_starts_in_shader_read() {
    let (mut device, mut registry) = setup();
    let desc = TextureDesc::new_2d(2, 2, Format::R8G8B8A8_UNORM, TextureUsage::SHADER_RESOURCE);
    let handle = registry.create_texture(&mut device, &desc, Some(&[255u8; 16])).unwrap();
    assert_eq!(registry.texture_info(handle).unwrap().state, ResourceState::ShaderRead);
}

#[test]
fn test_upload_without_shader_resource_is_rejected() {
    let (mut device, mut registry) = setup();
    let desc = TextureDesc::new_2d(2, 2, Format::R8G8B8A8_UNORM, TextureUsage::COLOR_TARGET);
    assert!(matches!(
        registry.create_texture(&mut device, &desc, Some(&[255u8; 16])),
        Err(Error::Resource(ResourceError::UnsupportedUsageCombination(_)))
    ));
    assert_eq!(device.live_textures(), 0);
}

// ============================================================================
// DEFERRED DESTRUCTION
// ============================================================================

#[test]
fn test_destroyed_handle_is_invalid_immediately() {
    let (mut device, mut registry) = setup();
    let handle = registry.create_texture(&mut device, &shadow_map_desc(), None).unwrap();
    registry.destroy_texture(handle).unwrap();

    assert_eq!(
        registry.texture_info(handle).unwrap_err(),
        Error::Resource(ResourceError::InvalidHandle(HandleKind::Texture))
    );
    assert!(registry.use_texture(handle, 3).is_err());
    assert_eq!(
        registry.destroy_texture(handle).unwrap_err(),
        Error::Resource(ResourceError::InvalidHandle(HandleKind::Texture))
    );
    // Native object survives until reconciliation
    assert!(registry.resolve_texture(handle).is_some());
    assert_eq!(device.live_textures(), 1);
}

#[test]
fn test_release_waits_for_last_use() {
    let (mut device, mut registry) = setup();
    let handle = registry.create_texture(&mut device, &shadow_map_desc(), None).unwrap();
    let id = registry.texture_id(handle).unwrap();
    registry.use_texture(handle, 5).unwrap();
    registry.destroy_texture(handle).unwrap();

    assert_eq!(registry.reconcile(&mut device, 4), 0);
    assert_eq!(registry.pending_release_count(), 1);
    assert_eq!(registry.bindless_slots_in_use(), 1);

    assert_eq!(registry.reconcile(&mut device, 5), 1);
    assert!(registry.resolve_texture(handle).is_none());
    assert_eq!(registry.bindless_slots_in_use(), 0);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.bindless_slot(id), None);
}

#[test]
fn test_unused_resource_releases_at_next_reconcile() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::cpu_to_gpu(64, 0, BufferUsage::UNIFORM);
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();
    registry.destroy_buffer(handle).unwrap();
    assert_eq!(registry.reconcile(&mut device, 0), 1);
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_stale_handle_does_not_alias_new_resource() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::cpu_to_gpu(64, 0, BufferUsage::UNIFORM);
    let old = registry.create_buffer(&mut device, &desc, None).unwrap();
    registry.destroy_buffer(old).unwrap();
    registry.reconcile(&mut device, 0);
    let new = registry.create_buffer(&mut device, &desc, None).unwrap();
    assert_ne!(old, new);
    assert!(registry.buffer_info(old).is_err());
    assert!(registry.buffer_info(new).is_ok());
}

#[test]
fn test_release_all_frees_live_and_pending() {
    let (mut device, mut registry) = setup();
    let a = registry.create_texture(&mut device, &shadow_map_desc(), None).unwrap();
    registry
        .create_buffer(&mut device, &BufferDesc::gpu_only(16, 0, BufferUsage::VERTEX), None)
        .unwrap();
    registry.use_texture(a, 9).unwrap();
    registry.destroy_texture(a).unwrap();

    registry.release_all(&mut device);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(registry.pending_release_count(), 0);
    assert_eq!(registry.bindless_slots_in_use(), 0);
}

// ============================================================================
// NAMES & WRITES
// ============================================================================

#[test]
fn test_set_texture_name_updates_info_and_device() {
    let (mut device, mut registry) = setup();
    let handle = registry.create_texture(&mut device, &shadow_map_desc(), None).unwrap();
    registry.set_texture_name(&mut device, handle, "Cascade0").unwrap();
    assert_eq!(registry.texture_info(handle).unwrap().debug_name.as_deref(), Some("Cascade0"));
    assert!(matches!(
        device.events().last(),
        Some(HeadlessEvent::DebugName { name, .. }) if name == "Cascade0"
    ));
}

#[test]
fn test_write_buffer_updates_contents() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::cpu_to_gpu(8, 0, BufferUsage::UNIFORM);
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();
    registry.write_buffer(&mut device, handle, 4, &[9, 8, 7, 6]).unwrap();

    let native = registry.resolve_buffer(handle).unwrap();
    assert_eq!(device.buffer_contents(native), Some(&[0, 0, 0, 0, 9, 8, 7, 6][..]));
}

#[test]
fn test_write_buffer_out_of_range_fails() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::cpu_to_gpu(8, 0, BufferUsage::UNIFORM);
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();
    assert!(matches!(
        registry.write_buffer(&mut device, handle, 6, &[1, 2, 3, 4]),
        Err(Error::Resource(ResourceError::InvalidDescription(_)))
    ));
}

#[test]
fn test_write_buffer_offset_overflow_fails() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::cpu_to_gpu(8, 0, BufferUsage::UNIFORM);
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();
    assert!(matches!(
        registry.write_buffer(&mut device, handle, u64::MAX, &[1]),
        Err(Error::Resource(ResourceError::InvalidDescription(_)))
    ));
}

#[test]
fn test_write_gpu_only_buffer_fails() {
    let (mut device, mut registry) = setup();
    let desc = BufferDesc::gpu_only(8, 0, BufferUsage::VERTEX);
    let handle = registry.create_buffer(&mut device, &desc, None).unwrap();
    assert!(matches!(
        registry.write_buffer(&mut device, handle, 0, &[1]),
        Err(Error::Resource(ResourceError::UnsupportedUsageCombination(_)))
    ));
}
