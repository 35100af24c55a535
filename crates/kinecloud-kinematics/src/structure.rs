use std::collections::{HashMap, HashSet};

use kinecloud_3d::transforms::RigidTransform;
use serde::{Deserialize, Serialize};

use crate::{
    error::KinematicsError,
    frame::{Frame, Joint, JointLimits, JointType},
    tree::{KinematicTree, KinematicTreeBuilder},
};

/// Placement of a child link in its parent: translation and roll/pitch/yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Translation.
    pub xyz: [f64; 3],
    /// Fixed axis rotations about x, y and z, applied in that order.
    pub rpy: [f64; 3],
}

impl From<&RigidTransform> for Origin {
    fn from(t: &RigidTransform) -> Self {
        Self {
            xyz: t.translation,
            rpy: t.rpy(),
        }
    }
}

impl From<&Origin> for RigidTransform {
    fn from(o: &Origin) -> Self {
        RigidTransform::from_xyz_rpy(o.xyz, o.rpy)
    }
}

/// A rigid body of the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// Unique link name.
    pub name: String,
    /// Free text description of the part.
    #[serde(default)]
    pub description: String,
}

/// A joint of the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    /// Unique joint name.
    pub name: String,
    /// Kind of motion.
    #[serde(rename = "type")]
    pub joint_type: JointType,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Placement of the child in the parent.
    pub origin: Origin,
    /// Motion axis, present for movable joints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<[f64; 3]>,
    /// Joint limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<JointLimits>,
}

/// Structural description of an articulated model: links and the joints
/// connecting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureDescription {
    /// Model name.
    pub name: String,
    /// Links in part order.
    pub links: Vec<LinkDescription>,
    /// Joints, one per non-root link.
    pub joints: Vec<JointDescription>,
}

impl StructureDescription {
    /// Describe a kinematic tree.
    ///
    /// A non-root frame without a joint is described by a fixed joint named
    /// `<parent>_to_<child>`.
    pub fn from_tree(name: impl Into<String>, tree: &KinematicTree) -> Self {
        let links = tree
            .frames()
            .iter()
            .map(|f| LinkDescription {
                name: f.name.clone(),
                description: "part".to_string(),
            })
            .collect();

        let joints = tree
            .frames()
            .iter()
            .filter_map(|f| {
                let parent = f.parent.as_ref()?;
                let joint = f
                    .joint
                    .clone()
                    .unwrap_or_else(|| Joint::fixed(format!("{parent}_to_{}", f.name)));
                Some(JointDescription {
                    name: joint.name,
                    joint_type: joint.joint_type,
                    parent: parent.clone(),
                    child: f.name.clone(),
                    origin: Origin::from(&f.origin),
                    axis: joint.joint_type.is_movable().then_some(joint.axis),
                    limits: joint.limits,
                })
            })
            .collect();

        Self {
            name: name.into(),
            links,
            joints,
        }
    }

    /// The root link: the only link that is no joint's child.
    pub fn root_link(&self) -> Option<&LinkDescription> {
        let children = self
            .joints
            .iter()
            .map(|j| j.child.as_str())
            .collect::<HashSet<_>>();
        self.links.iter().find(|l| !children.contains(l.name.as_str()))
    }

    /// A tree builder with one frame per link, in link order.
    ///
    /// Attach geometry to the builder before building the tree.
    pub fn to_tree_builder(&self) -> Result<KinematicTreeBuilder, KinematicsError> {
        let links = self
            .links
            .iter()
            .map(|l| l.name.as_str())
            .collect::<HashSet<_>>();

        let mut parent_joint: HashMap<&str, &JointDescription> = HashMap::new();
        for joint in &self.joints {
            for link in [&joint.parent, &joint.child] {
                if !links.contains(link.as_str()) {
                    return Err(KinematicsError::UnknownLink {
                        joint: joint.name.clone(),
                        link: link.clone(),
                    });
                }
            }
            if parent_joint.insert(joint.child.as_str(), joint).is_some() {
                return Err(KinematicsError::MultipleParents(joint.child.clone()));
            }
        }

        let builder = self
            .links
            .iter()
            .fold(KinematicTree::builder(), |builder, link| {
                let frame = match parent_joint.get(link.name.as_str()) {
                    None => Frame::root(link.name.clone()),
                    Some(j) => {
                        let mut joint = Joint::new(
                            j.name.clone(),
                            j.joint_type,
                            j.axis.unwrap_or([1.0, 0.0, 0.0]),
                        );
                        joint.limits = j.limits;
                        Frame::child(link.name.clone(), j.parent.clone(), (&j.origin).into())
                            .with_joint(joint)
                    }
                };
                builder.frame(frame)
            });
        Ok(builder)
    }

    /// Rebuild a tree without geometry.
    pub fn to_tree(&self) -> Result<KinematicTree, KinematicsError> {
        self.to_tree_builder()?.build()
    }

    /// Parse a description from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write the description as indented JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
