use std::collections::{HashMap, HashSet};

use kinecloud_3d::{io::label_map::LabelMap, mesh::TriangleMesh};

use crate::{error::KinematicsError, frame::Frame};

/// Upper bound on the number of parent hops when walking towards the root.
pub const MAX_CHAIN_HOPS: usize = 10_000;

/// Identifier of a geometry inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub usize);

/// A local-space mesh owned by one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Identifier of the geometry.
    pub id: GeometryId,
    /// Name of the owning frame.
    pub owner: String,
    /// Mesh in the owner's coordinates.
    pub mesh: TriangleMesh,
}

/// An immutable tree of frames together with the geometry each frame owns.
///
/// Frames keep their insertion order. Parts (frames owning at least one
/// geometry) are numbered in that order, which defines the label ids.
#[derive(Debug, Clone)]
pub struct KinematicTree {
    frames: Vec<Frame>,
    index: HashMap<String, usize>,
    root: usize,
    geometries: Vec<Geometry>,
    ownership: HashMap<String, Vec<GeometryId>>,
}

impl KinematicTree {
    /// Start building a tree.
    pub fn builder() -> KinematicTreeBuilder {
        KinematicTreeBuilder::default()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the tree has no frames. A built tree always has a root.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frames in insertion order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The root frame.
    pub fn root(&self) -> &Frame {
        &self.frames[self.root]
    }

    /// Look up a frame by name.
    pub fn frame(&self, name: &str) -> Result<&Frame, KinematicsError> {
        self.index
            .get(name)
            .map(|&i| &self.frames[i])
            .ok_or_else(|| KinematicsError::UnknownFrame(name.to_string()))
    }

    /// The frame whose joint has the given name.
    pub fn joint_frame(&self, joint: &str) -> Result<&Frame, KinematicsError> {
        self.frames
            .iter()
            .find(|f| f.joint.as_ref().is_some_and(|j| j.name == joint))
            .ok_or_else(|| KinematicsError::UnknownJoint(joint.to_string()))
    }

    /// The frames from the root down to `name`, both included.
    pub fn chain(&self, name: &str) -> Result<Vec<&Frame>, KinematicsError> {
        let mut current = self.frame(name)?;
        let mut chain = vec![current];
        while let Some(parent) = current.parent.as_deref() {
            if chain.len() > MAX_CHAIN_HOPS {
                return Err(KinematicsError::Cycle(name.to_string()));
            }
            current = self.frame(parent)?;
            chain.push(current);
        }
        chain.reverse();
        Ok(chain)
    }

    /// All geometries in insertion order.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// A geometry by id.
    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id.0)
    }

    /// The geometries owned by a frame.
    pub fn geometries_of(&self, frame: &str) -> &[GeometryId] {
        self.ownership.get(frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of the frames owning geometry, in frame order.
    pub fn part_names(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter(|f| self.ownership.contains_key(&f.name))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// The label id to part name mapping of this tree.
    pub fn label_map(&self) -> LabelMap {
        // frame names are unique, so this cannot fail
        LabelMap::from_names(self.part_names()).unwrap_or_default()
    }

    /// The frame used to calibrate resolved transforms: the first non-root
    /// frame in insertion order.
    pub fn calibration_frame(&self) -> Option<&Frame> {
        self.frames.iter().find(|f| !f.is_root())
    }
}

/// Collects frames and geometry and validates them into a [`KinematicTree`].
#[derive(Debug, Clone, Default)]
pub struct KinematicTreeBuilder {
    frames: Vec<Frame>,
    geometries: Vec<(String, TriangleMesh)>,
}

impl KinematicTreeBuilder {
    /// Add a frame.
    pub fn frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Attach a local-space mesh to a frame.
    pub fn geometry(mut self, owner: impl Into<String>, mesh: TriangleMesh) -> Self {
        self.geometries.push((owner.into(), mesh));
        self
    }

    /// Validate and build the tree.
    ///
    /// # Errors
    ///
    /// Fails with a structural error on duplicate frame or joint names,
    /// missing parents, a root count other than one, parent cycles, movable
    /// joints without a usable axis, or geometry owned by an unknown frame.
    pub fn build(self) -> Result<KinematicTree, KinematicsError> {
        let mut index = HashMap::new();
        for (i, frame) in self.frames.iter().enumerate() {
            if index.insert(frame.name.clone(), i).is_some() {
                return Err(KinematicsError::DuplicateFrame(frame.name.clone()));
            }
        }

        let mut joint_names = HashSet::new();
        for frame in &self.frames {
            if let Some(parent) = &frame.parent {
                if !index.contains_key(parent) {
                    return Err(KinematicsError::MissingParent {
                        frame: frame.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            if let Some(joint) = &frame.joint {
                if !joint_names.insert(joint.name.as_str()) {
                    return Err(KinematicsError::DuplicateJoint(joint.name.clone()));
                }
                if joint.joint_type.is_movable() {
                    joint
                        .motion(0.0)
                        .map_err(|source| KinematicsError::InvalidJointAxis {
                            joint: joint.name.clone(),
                            source,
                        })?;
                }
            }
        }

        let roots = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_root())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let root = match roots.as_slice() {
            [] => return Err(KinematicsError::NoRoot),
            [root] => *root,
            _ => {
                return Err(KinematicsError::MultipleRoots(
                    roots.iter().map(|&i| self.frames[i].name.clone()).collect(),
                ))
            }
        };

        // with a single root and known parents, a walk that does not end
        // within the hop budget is a cycle
        for frame in &self.frames {
            let mut current = frame;
            let mut hops = 0;
            while let Some(parent) = current.parent.as_deref() {
                hops += 1;
                if hops > MAX_CHAIN_HOPS.min(self.frames.len()) {
                    return Err(KinematicsError::Cycle(frame.name.clone()));
                }
                current = &self.frames[index[parent]];
            }
        }

        let mut geometries = Vec::with_capacity(self.geometries.len());
        let mut ownership: HashMap<String, Vec<GeometryId>> = HashMap::new();
        for (i, (owner, mesh)) in self.geometries.into_iter().enumerate() {
            if !index.contains_key(&owner) {
                return Err(KinematicsError::UnknownGeometryOwner(owner));
            }
            let id = GeometryId(i);
            ownership.entry(owner.clone()).or_default().push(id);
            geometries.push(Geometry { id, owner, mesh });
        }

        log::debug!(
            "built kinematic tree rooted at {:?}: {} frames, {} geometries",
            self.frames[root].name,
            self.frames.len(),
            geometries.len()
        );

        Ok(KinematicTree {
            frames: self.frames,
            index,
            root,
            geometries,
            ownership,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        frame::{Joint, JointType},
    };
    use kinecloud_3d::transforms::RigidTransform;

    fn arm() -> KinematicTreeBuilder {
        KinematicTree::builder()
            .frame(Frame::root("base"))
            .frame(
                Frame::child("upper", "base", RigidTransform::from_translation([0.0, 0.0, 1.0]))
                    .with_joint(Joint::new("shoulder", JointType::Revolute, [0.0, 1.0, 0.0])),
            )
            .frame(
                Frame::child("tool", "upper", RigidTransform::from_translation([0.0, 0.0, 0.5]))
                    .with_joint(Joint::fixed("wrist")),
            )
            .geometry("base", TriangleMesh::axis_aligned_box([0.0; 3], [1.0; 3]))
            .geometry("tool", TriangleMesh::axis_aligned_box([0.0; 3], [0.1; 3]))
    }

    #[test]
    fn test_build_and_lookup() -> Result<(), KinematicsError> {
        let tree = arm().build()?;
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().name, "base");
        assert_eq!(tree.joint_frame("shoulder")?.name, "upper");
        assert_eq!(tree.geometries_of("tool"), &[GeometryId(1)]);
        assert!(tree.geometries_of("upper").is_empty());
        assert_eq!(tree.part_names(), vec!["base", "tool"]);
        assert_eq!(tree.label_map().id("tool"), Some(1));
        assert_eq!(tree.calibration_frame().map(|f| f.name.as_str()), Some("upper"));

        let chain = tree.chain("tool")?;
        let names = chain.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["base", "upper", "tool"]);
        Ok(())
    }

    #[test]
    fn test_unknown_frame_is_lookup() -> Result<(), KinematicsError> {
        let tree = arm().build()?;
        let err = tree.frame("elbow").err();
        assert_eq!(err.as_ref().map(KinematicsError::kind), Some(ErrorKind::Lookup));
        assert_eq!(
            tree.joint_frame("elbow").err(),
            Some(KinematicsError::UnknownJoint("elbow".into()))
        );
        Ok(())
    }

    #[test]
    fn test_cycle_is_structural() {
        let res = KinematicTree::builder()
            .frame(Frame::root("base"))
            .frame(Frame::child("a", "b", RigidTransform::IDENTITY))
            .frame(Frame::child("b", "a", RigidTransform::IDENTITY))
            .build();
        let err = res.err();
        assert!(matches!(err, Some(KinematicsError::Cycle(_))));
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Structural));
    }

    #[test]
    fn test_structural_errors() {
        let missing_parent = KinematicTree::builder()
            .frame(Frame::root("base"))
            .frame(Frame::child("a", "ghost", RigidTransform::IDENTITY))
            .build();
        assert!(matches!(missing_parent, Err(KinematicsError::MissingParent { .. })));

        let two_roots = KinematicTree::builder()
            .frame(Frame::root("a"))
            .frame(Frame::root("b"))
            .build();
        assert!(matches!(two_roots, Err(KinematicsError::MultipleRoots(_))));

        let duplicate = KinematicTree::builder()
            .frame(Frame::root("a"))
            .frame(Frame::root("a"))
            .build();
        assert_eq!(duplicate.err(), Some(KinematicsError::DuplicateFrame("a".into())));

        let bad_axis = KinematicTree::builder()
            .frame(Frame::root("a"))
            .frame(
                Frame::child("b", "a", RigidTransform::IDENTITY)
                    .with_joint(Joint::new("j", JointType::Revolute, [0.0; 3])),
            )
            .build();
        assert!(matches!(bad_axis, Err(KinematicsError::InvalidJointAxis { .. })));

        let orphan_geometry = KinematicTree::builder()
            .frame(Frame::root("a"))
            .geometry("b", TriangleMesh::default())
            .build();
        assert!(matches!(
            orphan_geometry,
            Err(KinematicsError::UnknownGeometryOwner(_))
        ));

        assert_eq!(KinematicTree::builder().build().err(), Some(KinematicsError::NoRoot));
    }
}
