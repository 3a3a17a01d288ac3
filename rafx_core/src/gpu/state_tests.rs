use super::*;

#[test]
fn test_undefined_scope_is_top_of_pipe_without_access() {
    let scope = ResourceState::Undefined.scope();
    assert_eq!(scope.stages, PipelineStages::TOP_OF_PIPE);
    assert!(scope.access.is_empty());
}

#[test]
fn test_depth_write_scope_covers_fragment_tests() {
    let scope = ResourceState::DepthWrite.scope();
    assert!(scope.stages.contains(PipelineStages::EARLY_FRAGMENT_TESTS));
    assert!(scope.stages.contains(PipelineStages::LATE_FRAGMENT_TESTS));
    assert!(scope.access.contains(AccessFlags::DEPTH_STENCIL_WRITE));
}

#[test]
fn test_shader_read_scope() {
    let scope = ResourceState::ShaderRead.scope();
    assert!(scope.stages.contains(PipelineStages::FRAGMENT_SHADER));
    assert_eq!(scope.access, AccessFlags::SHADER_READ);
}

#[test]
fn test_write_states() {
    assert!(ResourceState::ColorAttachment.is_write());
    assert!(ResourceState::DepthWrite.is_write());
    assert!(ResourceState::CopyDst.is_write());
    assert!(!ResourceState::ShaderRead.is_write());
    assert!(!ResourceState::DepthRead.is_write());
    assert!(!ResourceState::Present.is_write());
}

#[test]
fn test_required_usage() {
    assert_eq!(ResourceState::DepthWrite.required_usage(), Some(TextureUsage::DEPTH_STENCIL));
    assert_eq!(ResourceState::ShaderRead.required_usage(), Some(TextureUsage::SHADER_RESOURCE));
    assert_eq!(ResourceState::Undefined.required_usage(), None);
}

#[test]
fn test_allows_aspect() {
    assert!(ResourceState::DepthWrite.allows_aspect(TextureAspect::Depth));
    assert!(!ResourceState::DepthWrite.allows_aspect(TextureAspect::Color));
    assert!(!ResourceState::ColorAttachment.allows_aspect(TextureAspect::Depth));
    assert!(ResourceState::ShaderRead.allows_aspect(TextureAspect::Depth));
}
