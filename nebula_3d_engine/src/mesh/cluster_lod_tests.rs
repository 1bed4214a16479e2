use super::*;
use super::super::meshlet::build_meshlets;

fn build_hierarchy(meshlet_target: usize) -> ClusterLodHierarchy {
    // A long triangle ribbon produces one meshlet per ~124 triangles
    let triangles = meshlet_target * 124;
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for i in 0..(triangles + 2) as u32 {
        positions.extend_from_slice(&[i as f32, (i % 2) as f32, 0.0]);
    }
    for i in 0..triangles as u32 {
        indices.extend_from_slice(&[i, i + 1, i + 2]);
    }
    let build = build_meshlets(&indices, &positions);
    ClusterLodHierarchy::build(&build, DEFAULT_NODE_WIDTH)
}

#[test]
fn test_root_is_node_zero_and_covers_everything() {
    let hierarchy = build_hierarchy(64);
    assert!(!hierarchy.nodes.is_empty());
    assert_eq!(hierarchy.root_node_index(), 0);

    // Walk the tree from the root; every group must be reachable exactly once
    let mut reached_groups = vec![false; hierarchy.groups.len()];
    let mut stack = vec![0u32];
    while let Some(index) = stack.pop() {
        let node = &hierarchy.nodes[index as usize];
        if node.range.is_group == 1 {
            let group = node.range.index_or_offset as usize;
            assert!(!reached_groups[group], "group {} reached twice", group);
            reached_groups[group] = true;
        } else {
            let first = node.range.index_or_offset;
            let count = node.range.count_minus_one + 1;
            for child in first..first + count {
                assert!((child as usize) < hierarchy.nodes.len());
                stack.push(child);
            }
        }
    }
    assert!(reached_groups.iter().all(|&reached| reached));
}

#[test]
fn test_groups_cover_contiguous_meshlet_ranges() {
    let hierarchy = build_hierarchy(32);
    let mut covered = 0u32;
    for group in &hierarchy.groups {
        assert_eq!(group.first_meshlet, covered);
        covered += group.meshlet_count;
    }
    assert_eq!(covered as usize, hierarchy.meshlets.len());
}

#[test]
fn test_parent_metrics_are_monotonic() {
    let hierarchy = build_hierarchy(64);
    for node in &hierarchy.nodes {
        if node.range.is_group == 1 {
            continue;
        }
        let first = node.range.index_or_offset;
        let count = node.range.count_minus_one + 1;
        for child_index in first..first + count {
            let child = &hierarchy.nodes[child_index as usize];
            // The cut selection relies on parent error >= child error and
            // the parent sphere enclosing every child sphere
            assert!(
                node.traversal_metric.max_quadric_error
                    >= child.traversal_metric.max_quadric_error
            );
            let dx = node.traversal_metric.bounding_sphere_x
                - child.traversal_metric.bounding_sphere_x;
            let dy = node.traversal_metric.bounding_sphere_y
                - child.traversal_metric.bounding_sphere_y;
            let dz = node.traversal_metric.bounding_sphere_z
                - child.traversal_metric.bounding_sphere_z;
            let distance = (dx * dx + dy * dy + dz * dz).sqrt();
            assert!(
                distance + child.traversal_metric.bounding_sphere_radius
                    <= node.traversal_metric.bounding_sphere_radius + 1e-3
            );
        }
    }
}

#[test]
fn test_child_local_indices_are_group_local() {
    let hierarchy = build_hierarchy(16);
    for child in &hierarchy.children {
        let group = &hierarchy.groups[child.group_index as usize];
        for i in 0..child.meshlet_count {
            let local = hierarchy.child_local_meshlet_indices
                [(child.first_local_meshlet + i) as usize];
            assert!(local < group.meshlet_count);
        }
    }
}

#[test]
fn test_empty_build_produces_empty_hierarchy() {
    let hierarchy = ClusterLodHierarchy::build(&Default::default(), DEFAULT_NODE_WIDTH);
    assert!(hierarchy.nodes.is_empty());
    assert!(hierarchy.groups.is_empty());
}
