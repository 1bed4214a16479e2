//! Readback round-trip (S6): texture -> DDS file -> texture inputs, with
//! byte-exact pixel data for uncompressed formats.

use std::sync::{Arc, Mutex};

use nebula_3d_engine::resources::{readback, ReadbackManager, ResourceManager,
    TextureDescription};
use nebula_3d_engine::rhi::mock_device::MockDevice;
use nebula_3d_engine::rhi::{Device, Format, ResourceState, SamplerDesc, TextureSubresourceData};

fn fixture() -> (Arc<Mutex<dyn Device>>, ResourceManager, ReadbackManager) {
    let device: Arc<Mutex<dyn Device>> = Arc::new(Mutex::new(MockDevice::new()));
    let resources = ResourceManager::new(device.clone(), 2).unwrap();
    let readback = ReadbackManager::new(device.clone()).unwrap();
    (device, resources, readback)
}

fn scratch_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nebula3d-{}-{}.dds", std::process::id(), name))
}

/// Deterministic pixel pattern per (mip, slice)
fn pattern(mip: u32, slice: u32, bytes: usize) -> Vec<u8> {
    (0..bytes)
        .map(|i| ((i as u32).wrapping_mul(31) ^ (mip * 7) ^ (slice * 13)) as u8)
        .collect()
}

// S6: save a cubemap with known contents, reload the DDS, and compare
// dimensions, mip count and the exact bytes of every subresource.
#[test]
fn test_cubemap_dds_round_trip_is_byte_exact() {
    let (_device, mut resources, mut readback_manager) = fixture();

    let size = 64u32;
    let mips = 3u32;
    let format = Format::R16G16B16A16_FLOAT;
    let bpp = format.bytes_per_pixel();

    let mut initial = Vec::new();
    for slice in 0..6 {
        for mip in 0..mips {
            let extent = (size >> mip).max(1);
            initial.push(TextureSubresourceData {
                mip,
                slice,
                data: pattern(mip, slice, (extent * extent * bpp) as usize),
            });
        }
    }

    let texture = resources
        .create_texture(
            &TextureDescription {
                width: size,
                height: size,
                mip_levels: mips,
                array_layers: 6,
                cubemap: true,
                format,
                has_srv: true,
                has_uav: false,
                has_rtv: false,
                has_dsv: false,
                per_mip_srvs: false,
                initial_state: ResourceState::AllSrv,
                sampler: Some(SamplerDesc::default()),
                name: "EnvironmentCube".to_string(),
            },
            &initial,
        )
        .unwrap();

    let path = scratch_path("cubemap");
    let fence_value = readback_manager
        .save_cubemap_to_dds(&texture, &path)
        .unwrap();
    assert!(fence_value > 0);

    // The mock device signals at submit; one poll completes the request
    assert_eq!(readback_manager.poll().unwrap(), 1);
    assert_eq!(readback_manager.pending(), 0);

    let (desc, subresources) = readback::load_dds(&path).unwrap();
    assert_eq!(desc.width, size);
    assert_eq!(desc.height, size);
    assert_eq!(desc.mip_levels, mips);
    assert_eq!(desc.array_layers, 6);
    assert!(desc.cubemap);
    assert_eq!(desc.format, format);

    for sub in &subresources {
        let extent = (size >> sub.mip).max(1);
        let expected = pattern(sub.mip, sub.slice, (extent * extent * bpp) as usize);
        assert_eq!(
            sub.data, expected,
            "mip {} face {} differs after round trip",
            sub.mip, sub.slice
        );
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_2d_texture_round_trip_preserves_mip_chain() {
    let (_device, mut resources, mut readback_manager) = fixture();

    let format = Format::R8G8B8A8_UNORM;
    let mut initial = Vec::new();
    for mip in 0..4 {
        let extent = (32u32 >> mip).max(1);
        initial.push(TextureSubresourceData {
            mip,
            slice: 0,
            data: pattern(mip, 0, (extent * extent * 4) as usize),
        });
    }
    let texture = resources
        .create_texture(
            &TextureDescription {
                width: 32,
                height: 32,
                mip_levels: 4,
                array_layers: 1,
                cubemap: false,
                format,
                has_srv: true,
                has_uav: false,
                has_rtv: false,
                has_dsv: false,
                per_mip_srvs: false,
                initial_state: ResourceState::AllSrv,
                sampler: None,
                name: "Mipped".to_string(),
            },
            &initial,
        )
        .unwrap();

    let path = scratch_path("mipped");
    readback_manager.save_texture_to_dds(&texture, &path).unwrap();
    readback_manager.flush().unwrap();

    let (desc, subresources) = readback::load_dds(&path).unwrap();
    assert_eq!(desc.mip_levels, 4);
    assert_eq!(subresources.len(), 4);
    for sub in &subresources {
        let extent = (32u32 >> sub.mip).max(1);
        assert_eq!(sub.data.len(), (extent * extent * 4) as usize);
    }

    std::fs::remove_file(&path).ok();
}
