use std::collections::BTreeMap;

use kinecloud_3d::{
    io::label_map::LabelMap,
    mesh::TriangleMesh,
    pointcloud::LabeledPointCloud,
    reconstruction::{MeshReconstructor, ReconstructedSurface, ReconstructionParams},
};
use kinecloud_kinematics::{
    frame::JointLimits,
    resolver::{JointConfiguration, TransformResolver},
    structure::{JointDescription, Origin, StructureDescription},
    KinematicsError,
};
use rayon::prelude::*;
use serde::Serialize;

/// Effort limit given to movable joints that declare none.
pub const DEFAULT_EFFORT: f64 = 1.0;

/// Velocity limit given to movable joints that declare none.
pub const DEFAULT_VELOCITY: f64 = 1.0;

/// Shape attached to a reassembled link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkGeometry {
    /// A reconstructed mesh stored in a file.
    Mesh {
        /// Path of the mesh file.
        filename: String,
    },
    /// A box primitive.
    Box {
        /// Edge lengths.
        size: [f64; 3],
    },
}

/// Placed geometry of a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkShape {
    /// Placement of the geometry in the link frame.
    pub origin: Origin,
    /// The geometry.
    pub geometry: LinkGeometry,
}

/// A link of the reassembled model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReassembledLink {
    /// Link name.
    pub name: String,
    /// Rendered shape.
    pub visual: LinkShape,
    /// Collision shape, identical to the visual one.
    pub collision: LinkShape,
}

/// A structure description rebuilt around surfaces reconstructed from points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReassembledModel {
    /// Model name.
    pub name: String,
    /// Links in structure order.
    pub links: Vec<ReassembledLink>,
    /// Joints with completed limits.
    pub joints: Vec<JointDescription>,
    /// Reconstructed meshes in link coordinates, keyed by mesh file name.
    #[serde(skip)]
    pub meshes: BTreeMap<String, TriangleMesh>,
}

impl ReassembledModel {
    /// Write the model without its meshes as indented JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Mesh files the links reference, in link order. The caller writes them
    /// from [`ReassembledModel::meshes`].
    pub fn mesh_files(&self) -> impl Iterator<Item = &str> {
        self.links.iter().filter_map(|l| match &l.visual.geometry {
            LinkGeometry::Mesh { filename } => Some(filename.as_str()),
            LinkGeometry::Box { .. } => None,
        })
    }

    /// Number of links that fell back to a box primitive.
    pub fn num_fallbacks(&self) -> usize {
        self.links
            .iter()
            .filter(|l| matches!(l.visual.geometry, LinkGeometry::Box { .. }))
            .count()
    }
}

/// Rebuilds per-link surfaces from a labeled cloud and reattaches them to a
/// structure description.
#[derive(Debug, Clone)]
pub struct Reassembler {
    reconstructor: MeshReconstructor,
    mesh_dir: String,
}

impl Reassembler {
    /// Create a reassembler referencing meshes under `mesh_dir`.
    pub fn new(params: ReconstructionParams, mesh_dir: impl Into<String>) -> Self {
        Self {
            reconstructor: MeshReconstructor::new(params),
            mesh_dir: mesh_dir.into(),
        }
    }

    /// Reassemble a model.
    ///
    /// The points of each link are selected through `label_map` by link name
    /// and moved into the link frame resolved at `joints`. Each link gets a
    /// reconstructed mesh, or a box primitive when reconstruction fails or
    /// the link has no points.
    ///
    /// # Arguments
    ///
    /// * `structure` - Links and joints of the model.
    /// * `cloud` - Labeled cloud, denormalized before use.
    /// * `label_map` - Label id to link name mapping of `cloud`.
    /// * `joints` - Joint positions the cloud was captured at.
    pub fn reassemble(
        &self,
        structure: &StructureDescription,
        cloud: &LabeledPointCloud,
        label_map: &LabelMap,
        joints: JointConfiguration,
    ) -> Result<ReassembledModel, KinematicsError> {
        let tree = structure.to_tree()?;
        let resolver = TransformResolver::new(&tree, joints, None)?;

        let mut by_label = cloud.denormalized().split_by_label();
        let inputs = structure
            .links
            .iter()
            .map(|link| {
                let to_local = resolver.world_transform(&link.name)?.inverse();
                let points = label_map
                    .id(&link.name)
                    .and_then(|id| by_label.remove(&id))
                    .unwrap_or_default();
                Ok::<_, KinematicsError>((link.name.as_str(), to_local.transform_points(&points)))
            })
            .collect::<Result<Vec<_>, KinematicsError>>()?;

        let surfaces = inputs
            .par_iter()
            .map(|(name, points)| {
                if points.is_empty() {
                    log::warn!("link {name:?} has no points");
                }
                self.reconstructor.reconstruct(points)
            })
            .collect::<Vec<_>>();

        let mut links = Vec::with_capacity(inputs.len());
        let mut meshes = BTreeMap::new();
        for ((name, _), surface) in inputs.iter().zip(surfaces) {
            let shape = match surface {
                ReconstructedSurface::Mesh(mesh) => {
                    let filename = format!("{}/{name}.obj", self.mesh_dir);
                    meshes.insert(filename.clone(), mesh);
                    LinkShape {
                        origin: Origin::default(),
                        geometry: LinkGeometry::Mesh { filename },
                    }
                }
                ReconstructedSurface::BoundingBox { center, size } => LinkShape {
                    origin: Origin {
                        xyz: center,
                        rpy: [0.0; 3],
                    },
                    geometry: LinkGeometry::Box { size },
                },
            };
            links.push(ReassembledLink {
                name: name.to_string(),
                visual: shape.clone(),
                collision: shape,
            });
        }

        let model = ReassembledModel {
            name: structure.name.clone(),
            links,
            joints: structure.joints.iter().map(complete_limits).collect(),
            meshes,
        };
        log::info!(
            "reassembled {} links, {} with box fallback",
            model.links.len(),
            model.num_fallbacks()
        );
        Ok(model)
    }
}

/// Give movable joints effort and velocity limits and keep position limits
/// only where the joint type has them.
pub fn complete_limits(joint: &JointDescription) -> JointDescription {
    let limits = joint.joint_type.is_movable().then(|| {
        let known = joint.limits.unwrap_or_default();
        let positional = joint.joint_type.has_position_limits();
        JointLimits {
            lower: known.lower.filter(|_| positional),
            upper: known.upper.filter(|_| positional),
            effort: Some(known.effort.unwrap_or(DEFAULT_EFFORT)),
            velocity: Some(known.velocity.unwrap_or(DEFAULT_VELOCITY)),
        }
    });
    JointDescription {
        limits,
        ..joint.clone()
    }
}
