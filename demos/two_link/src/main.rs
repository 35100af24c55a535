use argh::FromArgs;
use std::path::PathBuf;

use kinecloud::diagnostics::diagnose;
use kinecloud::k3d::{
    io::label_map::LabelMap, mesh::TriangleMesh, segmentation::Segmenter,
    transforms::RigidTransform,
};
use kinecloud::kinematics::{
    frame::{Frame, Joint, JointLimits, JointType},
    resolver::{CalibrationReference, JointConfiguration, TransformResolver},
    structure::StructureDescription,
    tree::KinematicTree,
};
use kinecloud::reassemble::Reassembler;
use kinecloud::{generate_labeled_cloud, PipelineConfig};

#[derive(FromArgs)]
/// Sample a two link model into a labeled cloud, then reassemble it from the
/// segmented points
struct Args {
    /// path to a JSON pipeline configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// position of the hinge in radians
    #[argh(option, short = 'q', default = "0.0")]
    hinge: f64,

    /// directory to write the dataset and the reassembled model to
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    // a unit base with a unit arm hinged on top of it
    let tree = KinematicTree::builder()
        .frame(Frame::root("base"))
        .frame(
            Frame::child("arm", "base", RigidTransform::from_translation([0.0, 0.0, 1.0]))
                .with_joint(
                    Joint::new("hinge", JointType::Revolute, [1.0, 0.0, 0.0]).with_limits(
                        JointLimits {
                            lower: Some(-1.57),
                            upper: Some(1.57),
                            ..Default::default()
                        },
                    ),
                ),
        )
        .geometry("base", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
        .geometry("arm", TriangleMesh::axis_aligned_box([0.0, 0.0, 0.6], [0.4, 0.4, 1.2]))
        .build()?;

    let joints = JointConfiguration::default().with_position("hinge", args.hinge);

    let mut reference = CalibrationReference::default();
    reference.positions.insert("arm".to_string(), [0.0, 0.0, 1.0]);

    // forward: model to labeled cloud
    let generated = generate_labeled_cloud(&tree, joints.clone(), Some(&reference), &config)?;
    let resolver = TransformResolver::new(&tree, joints.clone(), None)?;
    println!("{}", diagnose(&generated, &resolver)?);

    // inverse: segment the raw cloud and rebuild the parts
    let segmenter = Segmenter::new(config.segmenter.clone());
    let (segmentation, segmented) = segmenter.segment(&generated.cloud)?;
    println!(
        "found {} segments along {:?}",
        segmentation.num_segments(),
        segmentation.axis
    );

    // segment ids grow along the axis, so they name parts only when the parts
    // are stacked along it in frame order, as base and arm are here
    let segment_names = if segmentation.num_segments() == generated.label_map.len() {
        generated.label_map.clone()
    } else {
        log::warn!(
            "segment count {} differs from part count {}, parts will fall back to boxes",
            segmentation.num_segments(),
            generated.label_map.len()
        );
        LabelMap::from_names((0..segmentation.num_segments()).map(|i| format!("segment_{i}")))?
    };

    let structure = StructureDescription::from_tree("two_link", &tree);
    let reassembler = Reassembler::new(config.reconstruction.clone(), config.mesh_dir.clone());
    let model = reassembler.reassemble(&structure, &segmented, &segment_names, joints)?;
    for link in &model.links {
        println!("{}: {:?}", link.name, link.visual.geometry);
    }

    if let Some(output) = args.output {
        generated.save(&output)?;
        std::fs::write(output.join("model.json"), model.to_json()?)?;
        println!("wrote dataset and model to {}", output.display());
        for filename in model.mesh_files() {
            println!("note: {filename} is referenced but not written, mesh export is not part of this demo");
        }
    }

    Ok(())
}
