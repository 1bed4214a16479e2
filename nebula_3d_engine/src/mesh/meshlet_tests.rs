use super::*;

/// A triangle strip grid with enough geometry to span several meshlets
fn grid(width: u32, height: u32) -> (Vec<f32>, Vec<u32>) {
    let mut positions = Vec::new();
    for y in 0..=height {
        for x in 0..=width {
            positions.extend_from_slice(&[x as f32, y as f32, 0.0]);
        }
    }
    let stride = width + 1;
    let mut indices = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let base = y * stride + x;
            indices.extend_from_slice(&[base, base + 1, base + stride]);
            indices.extend_from_slice(&[base + 1, base + stride + 1, base + stride]);
        }
    }
    (positions, indices)
}

#[test]
fn test_budgets_are_respected() {
    let (positions, indices) = grid(32, 32);
    let build = build_meshlets(&indices, &positions);
    assert!(build.meshlets.len() > 1);
    for meshlet in &build.meshlets {
        assert!(meshlet.vertex_count <= MAX_MESHLET_VERTICES);
        assert!(meshlet.triangle_count <= MAX_MESHLET_TRIANGLES);
    }
}

#[test]
fn test_every_triangle_is_preserved() {
    let (positions, indices) = grid(16, 16);
    let build = build_meshlets(&indices, &positions);
    let total_triangles: u32 = build.meshlets.iter().map(|m| m.triangle_count).sum();
    assert_eq!(total_triangles as usize, indices.len() / 3);
    assert_eq!(build.meshlet_triangles.len(), indices.len());
    assert_eq!(build.bounds.len(), build.meshlets.len());
}

#[test]
fn test_local_indices_resolve_to_original_vertices() {
    let (positions, indices) = grid(8, 8);
    let build = build_meshlets(&indices, &positions);

    // Re-expand every meshlet triangle through the remap and compare with
    // the source index buffer (scan-order clustering preserves order)
    let mut expanded = Vec::new();
    for meshlet in &build.meshlets {
        for i in 0..(meshlet.triangle_count * 3) as usize {
            let local = build.meshlet_triangles[meshlet.triangle_offset as usize + i];
            expanded
                .push(build.meshlet_vertices[meshlet.vertex_offset as usize + local as usize]);
        }
    }
    assert_eq!(expanded, indices);
}

#[test]
fn test_bounds_contain_their_vertices() {
    let (positions, indices) = grid(8, 8);
    let build = build_meshlets(&indices, &positions);
    for (meshlet, bounds) in build.meshlets.iter().zip(&build.bounds) {
        for i in 0..meshlet.vertex_count as usize {
            let v = build.meshlet_vertices[meshlet.vertex_offset as usize + i] as usize;
            let p = &positions[v * 3..v * 3 + 3];
            let d = ((p[0] - bounds.center[0]).powi(2)
                + (p[1] - bounds.center[1]).powi(2)
                + (p[2] - bounds.center[2]).powi(2))
            .sqrt();
            assert!(d <= bounds.radius + 1e-4);
        }
    }
}

#[test]
fn test_reordered_vertices_follow_meshlet_slots() {
    let (positions, indices) = grid(4, 4);
    let build = build_meshlets(&indices, &positions);
    let blob: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
    let reordered = build_meshlet_reordered_vertices(&build.meshlet_vertices, &blob, 12);
    assert_eq!(reordered.len(), build.meshlet_vertices.len() * 12);

    // Slot k of the reordered blob is vertex meshlet_vertices[k]
    let k = build.meshlet_vertices.len() / 2;
    let original = build.meshlet_vertices[k] as usize;
    let expected = &blob[original * 12..original * 12 + 12];
    assert_eq!(&reordered[k * 12..k * 12 + 12], expected);
}
