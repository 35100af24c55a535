use std::collections::HashSet;

use approx::assert_relative_eq;
use kinecloud::{
    generate_labeled_cloud,
    k3d::{
        io::label_map::LabelMap,
        label_transfer::transfer_labels,
        mesh::TriangleMesh,
        pointcloud::{LabeledPoint, LabeledPointCloud},
        reconstruction::{ReconstructionMethod, ReconstructionParams},
        segmentation::Segmenter,
        transforms::RigidTransform,
    },
    kinematics::{
        frame::{Frame, Joint, JointLimits, JointType},
        resolver::JointConfiguration,
        structure::{Origin, StructureDescription},
        tree::KinematicTree,
    },
    reassemble::{LinkGeometry, Reassembler, DEFAULT_EFFORT},
    PipelineConfig,
};

fn hinged_box() -> Result<KinematicTree, Box<dyn std::error::Error>> {
    Ok(KinematicTree::builder()
        .frame(Frame::root("body"))
        .frame(
            Frame::child("lid", "body", RigidTransform::from_translation([0.0, 0.0, 1.0]))
                .with_joint(
                    Joint::new("hinge", JointType::Revolute, [1.0, 0.0, 0.0]).with_limits(
                        JointLimits {
                            lower: Some(0.0),
                            upper: Some(1.5),
                            ..Default::default()
                        },
                    ),
                ),
        )
        .frame(Frame::child("handle", "lid", RigidTransform::from_translation([0.0, 0.5, 0.5])))
        .geometry("body", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
        .geometry("lid", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
        .build()?)
}

#[test]
fn test_step_function_segmentation() -> Result<(), Box<dyn std::error::Error>> {
    // 100 bins of width 0.03 over [0, 3], empty around z = 1 and z = 2
    let mut positions = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 3.0]];
    for k in 0..100 {
        let z = (k as f64 + 0.5) * 0.03;
        if (0.9..1.1).contains(&z) || (1.9..2.1).contains(&z) {
            continue;
        }
        positions.extend(std::iter::repeat_n([0.0, 0.0, z], 10));
    }
    let cloud = LabeledPointCloud::from_positions(&positions);

    let (segmentation, segmented) = Segmenter::default().segment(&cloud)?;
    assert_eq!(segmentation.boundaries.len(), 2);
    assert_relative_eq!(segmentation.boundaries[0], 1.005, epsilon = 1e-9);
    assert_relative_eq!(segmentation.boundaries[1], 1.995, epsilon = 1e-9);

    for p in segmented.points() {
        let z = p.position[2];
        let expected = if z < 1.0 {
            0
        } else if z < 2.0 {
            1
        } else {
            2
        };
        assert_eq!(p.label, expected, "z = {z}");
    }
    Ok(())
}

#[test]
fn test_label_transfer_partitions_faces() -> Result<(), Box<dyn std::error::Error>> {
    let tree = hinged_box()?;
    let mut config = PipelineConfig::default();
    config.sampler.samples_per_geometry = 512;
    let generated = generate_labeled_cloud(&tree, JointConfiguration::default(), None, &config)?;

    // a single reference mesh spanning both parts, in model units
    let reference = TriangleMesh::axis_aligned_box([0.0, 0.0, 0.5], [1.0, 1.0, 2.0]);
    let result = transfer_labels(&generated.cloud.denormalized(), &reference)?;

    let mut seen = HashSet::new();
    for faces in result.buckets.values() {
        for &face in faces {
            assert!(seen.insert(face), "face {face} in two buckets");
        }
    }
    assert_eq!(seen.len(), reference.num_faces());
    assert_eq!(result.face_labels.len(), reference.num_faces());
    assert!(result.buckets.keys().all(|&l| l < 2));
    Ok(())
}

#[test]
fn test_reassembly_with_box_fallback() -> Result<(), Box<dyn std::error::Error>> {
    let tree = hinged_box()?;
    let mut config = PipelineConfig::default();
    config.sampler.samples_per_geometry = 2048;
    let generated = generate_labeled_cloud(&tree, JointConfiguration::default(), None, &config)?;

    let structure = StructureDescription::from_tree("chest", &tree);
    let params = ReconstructionParams {
        method: ReconstructionMethod::BoundingBox,
        ..Default::default()
    };
    let model = Reassembler::new(params, "meshes").reassemble(
        &structure,
        &generated.cloud,
        &generated.label_map,
        JointConfiguration::default(),
    )?;

    assert_eq!(model.links.len(), 3);
    assert_eq!(model.num_fallbacks(), 3);
    assert!(model.meshes.is_empty());
    assert_eq!(model.mesh_files().count(), 0);

    // sampled parts: a unit box around the link origin
    for link in &model.links[..2] {
        assert_eq!(link.visual, link.collision);
        let LinkGeometry::Box { size } = link.visual.geometry else {
            panic!("{} is not a box", link.name);
        };
        for i in 0..3 {
            assert_relative_eq!(size[i], 1.0, epsilon = 0.05);
            assert_relative_eq!(link.visual.origin.xyz[i], 0.0, epsilon = 0.05);
        }
    }

    // the handle owns no geometry and gets the small default box
    let handle = &model.links[2];
    assert_eq!(handle.name, "handle");
    assert_eq!(handle.visual.geometry, LinkGeometry::Box { size: [0.1; 3] });

    let hinge = &model.joints[0];
    let limits = hinge.limits.ok_or("hinge without limits")?;
    assert_eq!(limits.upper, Some(1.5));
    assert_eq!(limits.effort, Some(DEFAULT_EFFORT));
    assert_eq!(model.joints[1].limits, None);

    let json = model.to_json()?;
    assert!(json.contains(r#""box""#));
    Ok(())
}

#[test]
fn test_reassembly_from_segments() -> Result<(), Box<dyn std::error::Error>> {
    let tree = hinged_box()?;
    let mut config = PipelineConfig::default();
    config.normalize = false;
    config.sampler.samples_per_geometry = 4096;
    let generated = generate_labeled_cloud(&tree, JointConfiguration::default(), None, &config)?;

    // forget the labels and recover them from the density gap between parts
    let mut positions = generated.cloud.positions();
    positions.retain(|p| (p[2] - 0.5).abs() > 0.05);
    let raw = LabeledPointCloud::from_positions(&positions);
    let (segmentation, segmented) = Segmenter::default().segment(&raw)?;
    assert_eq!(segmentation.num_segments(), 2);

    let structure = StructureDescription::from_tree("chest", &tree);
    let label_map = LabelMap::from_names(["body", "lid"])?;
    let params = ReconstructionParams {
        method: ReconstructionMethod::BoundingBox,
        ..Default::default()
    };
    let model = Reassembler::new(params, "meshes").reassemble(
        &structure,
        &segmented,
        &label_map,
        JointConfiguration::default(),
    )?;

    let LinkGeometry::Box { size } = model.links[1].visual.geometry else {
        panic!("lid is not a box");
    };
    assert!(size[2] < 1.0);
    assert_relative_eq!(size[0], 1.0, epsilon = 0.05);
    Ok(())
}

#[test]
fn test_reassembly_with_reconstructed_meshes() -> Result<(), Box<dyn std::error::Error>> {
    let tree = KinematicTree::builder()
        .frame(Frame::root("body"))
        .frame(Frame::child("lid", "body", RigidTransform::from_translation([0.0, 0.0, 2.0])))
        .frame(Frame::child("tag", "lid", RigidTransform::from_translation([0.0, 0.0, 1.0])))
        .geometry("body", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
        .geometry("lid", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
        .build()?;

    let mut config = PipelineConfig::default();
    config.normalize = false;
    config.sampler.samples_per_geometry = 2048;
    let generated = generate_labeled_cloud(&tree, JointConfiguration::default(), None, &config)?;

    // the tag only gets two points, too few to triangulate
    let mut points = generated.cloud.into_points();
    points.push(LabeledPoint::new([0.0, 0.0, 3.0], 2));
    points.push(LabeledPoint::new([0.1, 0.0, 3.0], 2));
    let cloud = LabeledPointCloud::new(points);
    let label_map = LabelMap::from_names(["body", "lid", "tag"])?;

    let structure = StructureDescription::from_tree("stack", &tree);
    let model = Reassembler::new(ReconstructionParams::default(), "meshes").reassemble(
        &structure,
        &cloud,
        &label_map,
        JointConfiguration::default(),
    )?;

    assert_eq!(model.num_fallbacks(), 1);
    assert_eq!(model.meshes.len(), 2);
    assert_eq!(
        model.mesh_files().collect::<Vec<_>>(),
        vec!["meshes/body.obj", "meshes/lid.obj"]
    );

    for link in &model.links[..2] {
        let filename = format!("meshes/{}.obj", link.name);
        assert_eq!(
            link.visual.geometry,
            LinkGeometry::Mesh {
                filename: filename.clone()
            }
        );
        assert_eq!(link.visual.origin, Origin::default());
        assert_eq!(link.visual, link.collision);

        // meshes live in the link frame
        let mesh = model.meshes.get(&filename).ok_or("missing mesh")?;
        assert!(mesh.num_faces() > 0);
        let (min, max) = mesh.bounds().ok_or("empty mesh")?;
        for i in 0..3 {
            assert_relative_eq!(min[i], -0.5, epsilon = 0.05);
            assert_relative_eq!(max[i], 0.5, epsilon = 0.05);
        }
    }

    let tag = &model.links[2];
    assert_eq!(tag.name, "tag");
    assert!(matches!(tag.visual.geometry, LinkGeometry::Box { .. }));
    Ok(())
}
