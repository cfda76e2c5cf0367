//! Skeletal armature
//!
//! An [`Armature`] is a handle to three allocations in a sub-stack: a table
//! of [`Bone`] records, the current skinning transform of each bone, and a
//! packed name buffer. Bones refer to each other by index; a bone knows its
//! parent's index and up to [`MAX_CHILDREN`] child indices.

use crate::memory::{Allocation, MemoryError, MemorySlab, SubStack};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use thiserror::Error;

pub const MAX_BONES: usize = 32;
pub const MAX_CHILDREN: usize = 4;

const NO_PARENT: u8 = u8::MAX;

/// Position of a bone inside its armature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneIndex(u8);

impl BoneIndex {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Error)]
pub enum ArmatureError {
    #[error("armature already holds the maximum of {} bones", MAX_BONES)]
    TooManyBones,

    #[error("bone {parent:?} already has {} children", MAX_CHILDREN)]
    TooManyChildren { parent: BoneIndex },

    #[error("parent bone {parent:?} does not exist")]
    UnknownParent { parent: BoneIndex },

    #[error("name buffer cannot fit bone `{0}`")]
    NameBufferFull(String),

    #[error("pose holds {given} bones, armature has {expected}")]
    PoseMismatch { given: usize, expected: usize },

    #[error("sub-stack exhausted while creating the armature")]
    OutOfMemory,

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// One bone record as stored in the arena.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Bone {
    pub bind_pose: Mat4,
    pub inv_bind_pose: Mat4,
    name_start: u16,
    name_len: u16,
    parent: u8,
    child_count: u8,
    children: [u8; MAX_CHILDREN],
    _pad: [u8; 6],
}

impl Bone {
    pub fn parent(&self) -> Option<BoneIndex> {
        (self.parent != NO_PARENT).then_some(BoneIndex(self.parent))
    }

    pub fn children(&self) -> impl Iterator<Item = BoneIndex> + '_ {
        self.children[..usize::from(self.child_count)]
            .iter()
            .map(|&i| BoneIndex(i))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Armature {
    bones: Allocation,
    transforms: Allocation,
    names: Allocation,
    len: u8,
    next_name: u16,
}

impl Armature {
    /// Reserve room for [`MAX_BONES`] bones whose names total at most
    /// `name_buffer_size` bytes.
    pub fn create(stack: &mut SubStack, name_buffer_size: u16) -> Result<Self, ArmatureError> {
        let bones = stack
            .allocate_array::<Bone>(MAX_BONES)
            .ok_or(ArmatureError::OutOfMemory)?;
        let transforms = stack
            .allocate_array::<Mat4>(MAX_BONES)
            .ok_or(ArmatureError::OutOfMemory)?;
        let names = stack
            .allocate(usize::from(name_buffer_size))
            .ok_or(ArmatureError::OutOfMemory)?;

        Ok(Self {
            bones,
            transforms,
            names,
            len: 0,
            next_name: 0,
        })
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a bone. The parent must already be in the armature.
    pub fn add_bone(
        &mut self,
        slab: &mut MemorySlab,
        name: &str,
        bind_pose: Mat4,
        parent: Option<BoneIndex>,
    ) -> Result<BoneIndex, ArmatureError> {
        if self.len() >= MAX_BONES {
            return Err(ArmatureError::TooManyBones);
        }
        let start = usize::from(self.next_name);
        let end = start + name.len();
        if end > self.names.len() || end > usize::from(u16::MAX) {
            return Err(ArmatureError::NameBufferFull(name.to_owned()));
        }
        let index = BoneIndex(self.len);

        let bones = &mut slab.slice_mut::<Bone>(self.bones)?[..MAX_BONES];
        if let Some(parent) = parent {
            let parent_bone = bones[..usize::from(self.len)]
                .get_mut(parent.index())
                .ok_or(ArmatureError::UnknownParent { parent })?;
            let count = usize::from(parent_bone.child_count);
            if count >= MAX_CHILDREN {
                return Err(ArmatureError::TooManyChildren { parent });
            }
            parent_bone.children[count] = index.0;
            parent_bone.child_count += 1;
        }

        bones[index.index()] = Bone {
            bind_pose,
            inv_bind_pose: bind_pose.inverse(),
            name_start: start as u16,
            name_len: name.len() as u16,
            parent: parent.map_or(NO_PARENT, |p| p.0),
            child_count: 0,
            children: [0; MAX_CHILDREN],
            _pad: [0; 6],
        };
        slab.slice_mut::<Mat4>(self.transforms)?[index.index()] = Mat4::IDENTITY;
        slab.bytes_mut(self.names)?[start..end].copy_from_slice(name.as_bytes());

        self.next_name = end as u16;
        self.len += 1;
        tracing::trace!(name, index = index.index(), "bone added");
        Ok(index)
    }

    /// Every bone added so far, indexed by [`BoneIndex`].
    pub fn bones<'s>(&self, slab: &'s MemorySlab) -> Result<&'s [Bone], ArmatureError> {
        Ok(&slab.slice::<Bone>(self.bones)?[..self.len()])
    }

    pub fn bone(&self, slab: &MemorySlab, index: BoneIndex) -> Result<Option<Bone>, ArmatureError> {
        Ok(self.bones(slab)?.get(index.index()).copied())
    }

    pub fn find(&self, slab: &MemorySlab, name: &str) -> Result<Option<BoneIndex>, ArmatureError> {
        let names = slab.bytes(self.names)?;
        let found = self.bones(slab)?.iter().position(|bone| {
            let start = usize::from(bone.name_start);
            &names[start..start + usize::from(bone.name_len)] == name.as_bytes()
        });
        Ok(found.map(|i| BoneIndex(i as u8)))
    }

    /// First bone without a parent.
    pub fn root(&self, slab: &MemorySlab) -> Result<Option<BoneIndex>, ArmatureError> {
        let found = self
            .bones(slab)?
            .iter()
            .position(|bone| bone.parent == NO_PARENT);
        Ok(found.map(|i| BoneIndex(i as u8)))
    }

    /// Current skinning transform per bone, indexed like the bones.
    pub fn transforms<'s>(&self, slab: &'s MemorySlab) -> Result<&'s [Mat4], ArmatureError> {
        Ok(&slab.slice::<Mat4>(self.transforms)?[..self.len()])
    }

    pub fn apply_pose(
        &self,
        slab: &mut MemorySlab,
        pose: &ArmatureKeyFrame,
    ) -> Result<(), ArmatureError> {
        if pose.bones.len() != self.len() {
            return Err(ArmatureError::PoseMismatch {
                given: pose.bones.len(),
                expected: self.len(),
            });
        }
        let mut transforms = [Mat4::IDENTITY; MAX_BONES];
        for ((bone, key), out) in self
            .bones(slab)?
            .iter()
            .zip(&pose.bones)
            .zip(transforms.iter_mut())
        {
            *out = bone.inv_bind_pose * key.combined;
        }
        slab.slice_mut::<Mat4>(self.transforms)?[..self.len()]
            .copy_from_slice(&transforms[..self.len()]);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneKeyFrame {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub combined: Mat4,
}

impl BoneKeyFrame {
    pub fn new(translation: Vec3, scale: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            scale,
            rotation,
            combined: Mat4::from_scale_rotation_translation(scale, rotation, translation),
        }
    }
}

impl Default for BoneKeyFrame {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE, Quat::IDENTITY)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArmatureKeyFrame {
    pub bones: Vec<BoneKeyFrame>,
}

impl ArmatureKeyFrame {
    /// Blend two poses; `weight` 0 gives `a`, 1 gives `b`.
    pub fn blend(a: &ArmatureKeyFrame, b: &ArmatureKeyFrame, weight: f32) -> ArmatureKeyFrame {
        let weight = weight.clamp(0.0, 1.0);
        let bones = a
            .bones
            .iter()
            .zip(&b.bones)
            .map(|(ka, kb)| {
                BoneKeyFrame::new(
                    ka.translation.lerp(kb.translation, weight),
                    ka.scale.lerp(kb.scale, weight),
                    ka.rotation.lerp(kb.rotation, weight),
                )
            })
            .collect();
        ArmatureKeyFrame { bones }
    }
}
