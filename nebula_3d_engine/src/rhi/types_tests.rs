use super::*;

// ============================================================================
// State merging
// ============================================================================

#[test]
fn test_srv_substates_compose() {
    assert_eq!(
        ResourceState::NonPixelSrv.merge(ResourceState::PixelSrv),
        Some(ResourceState::AllSrv)
    );
    assert_eq!(
        ResourceState::AllSrv.merge(ResourceState::PixelSrv),
        Some(ResourceState::AllSrv)
    );
    assert_eq!(
        ResourceState::AllSrv.merge(ResourceState::AllSrv),
        Some(ResourceState::AllSrv)
    );
}

#[test]
fn test_writes_never_merge() {
    assert_eq!(ResourceState::RenderTarget.merge(ResourceState::AllSrv), None);
    assert_eq!(
        ResourceState::UnorderedAccess.merge(ResourceState::UnorderedAccess),
        Some(ResourceState::UnorderedAccess)
    );
    assert_eq!(ResourceState::CopyDest.merge(ResourceState::CopySource), None);
    // Non-SRV reads only merge with themselves
    assert_eq!(ResourceState::IndirectArgument.merge(ResourceState::AllSrv), None);
}

// ============================================================================
// Subresource ranges
// ============================================================================

#[test]
fn test_range_normalization_clamps_open_ends() {
    let range = SubresourceRange::ALL.normalized(6, 4);
    assert_eq!(range.mip_count, 6);
    assert_eq!(range.slice_count, 4);

    let range = SubresourceRange::mips(2, SubresourceRange::ALL_REMAINING).normalized(6, 1);
    assert_eq!(range.first_mip, 2);
    assert_eq!(range.mip_count, 4);
}

#[test]
fn test_range_overlap_and_containment() {
    let a = SubresourceRange::mips(0, 2).normalized(8, 1);
    let b = SubresourceRange::mips(1, 2).normalized(8, 1);
    let c = SubresourceRange::mips(4, 2).normalized(8, 1);
    assert!(a.overlaps(&b));
    assert!(!a.overlaps(&c));
    assert!(a.contains(&SubresourceRange::single(1, 0)));
    assert!(!a.contains(&b));
}

// ============================================================================
// Copy footprints
// ============================================================================

#[test]
fn test_footprints_respect_row_and_placement_alignment() {
    let desc = TextureDesc {
        width: 100,
        height: 64,
        mip_levels: 2,
        array_layers: 1,
        cubemap: false,
        format: Format::R8G8B8A8_UNORM,
        usage: TextureUsage::TRANSFER_SRC,
        name: "test".to_string(),
    };
    let range = FootprintRangeDesc {
        first_mip: 0,
        mip_count: 2,
        first_slice: 0,
        slice_count: 1,
    };
    let (footprints, total) = copyable_footprints(&desc, &range, 256, 0);
    assert_eq!(footprints.len(), 2);
    // 100 px * 4 B = 400 B rows, pitched up to 512
    assert_eq!(footprints[0].row_size, 400);
    assert_eq!(footprints[0].row_pitch, 512);
    assert_eq!(footprints[0].buffer_offset % FOOTPRINT_PLACEMENT_ALIGNMENT, 0);
    assert_eq!(footprints[1].buffer_offset % FOOTPRINT_PLACEMENT_ALIGNMENT, 0);
    assert_eq!(footprints[1].width, 50);
    assert_eq!(footprints[1].height, 32);
    assert!(total >= footprints[1].buffer_offset + footprints[1].total_bytes());
}

#[test]
fn test_mip_extent_floors_at_one() {
    let desc = TextureDesc {
        width: 4,
        height: 4,
        mip_levels: 4,
        array_layers: 1,
        cubemap: false,
        format: Format::R8_UNORM,
        usage: TextureUsage::SAMPLED,
        name: "tiny".to_string(),
    };
    assert_eq!(desc.mip_extent(3), (1, 1));
}
