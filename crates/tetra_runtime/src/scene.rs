//! Tetrahedron scene: arena-resident geometry, five animated instances and
//! the bone chain that bobs them.

use crate::palette::{ColorId, Palette};
use anyhow::{anyhow, Context, Result};
use std::f32::consts::{PI, TAU};
use tetra_core::armature::{Armature, ArmatureKeyFrame, BoneKeyFrame};
use tetra_core::glam::{Mat4, Quat, Vec2, Vec3};
use tetra_core::memory::{Allocation, MemorySlab, SubStack};

pub const TETRA_COUNT: usize = 5;
pub const VERTEX_COUNT: usize = 12;

const RADIUS: f32 = 3.0;

/// Vertex streams of one mesh, each an aligned allocation in the resident
/// stack.
#[derive(Debug, Clone, Copy)]
pub struct MeshData {
    pub positions: Allocation,
    pub normals: Allocation,
    pub uvs: Allocation,
    pub indices: Allocation,
    pub count: u32,
}

fn alloc_stream<T>(stack: &mut SubStack, what: &str) -> Result<Allocation> {
    stack
        .allocate_aligned(
            std::mem::size_of::<T>() * VERTEX_COUNT,
            std::mem::align_of::<T>(),
        )
        .ok_or_else(|| anyhow!("resident stack exhausted allocating tetrahedron {what}"))
}

/// Outward unit normal of the triangle `[a, b, c]` of a solid centred on the
/// origin.
fn face_normal([a, b, c]: [Vec3; 3]) -> Vec3 {
    let n = (b - a).cross(c - a).normalize();
    let centroid = (a + b + c) / 3.0;
    if n.dot(centroid) < 0.0 {
        -n
    } else {
        n
    }
}

impl MeshData {
    /// Regular tetrahedron with flat-shaded faces: four triangles, each with
    /// its own three vertices.
    pub fn tetrahedron(stack: &mut SubStack, slab: &mut MemorySlab) -> Result<Self> {
        let v1 = Vec3::new(0.0, 1.0, 0.0) * RADIUS;
        let v2 = Vec3::new(0.943, -0.333, 0.0) * RADIUS;
        let v3 = Vec3::new(-0.471, -0.333, 0.816) * RADIUS;
        let v4 = Vec3::new(-0.471, -0.333, -0.816) * RADIUS;

        let faces = [[v1, v2, v3], [v4, v3, v2], [v1, v4, v2], [v1, v3, v4]];

        let positions: Vec<Vec3> = faces.iter().flatten().copied().collect();
        let normals: Vec<Vec3> = faces
            .iter()
            .flat_map(|&face| [face_normal(face); 3])
            .collect();
        let uvs: Vec<Vec2> = (0..4)
            .flat_map(|_| [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 0.0)])
            .collect();
        let indices: Vec<u32> = (0..VERTEX_COUNT as u32).collect();

        let mesh = Self {
            positions: alloc_stream::<Vec3>(stack, "positions")?,
            normals: alloc_stream::<Vec3>(stack, "normals")?,
            uvs: alloc_stream::<Vec2>(stack, "uvs")?,
            indices: alloc_stream::<u32>(stack, "indices")?,
            count: VERTEX_COUNT as u32,
        };
        slab.write(mesh.positions, &positions)?;
        slab.write(mesh.normals, &normals)?;
        slab.write(mesh.uvs, &uvs)?;
        slab.write(mesh.indices, &indices)?;

        tracing::debug!(vertices = mesh.count, "tetrahedron geometry built");
        Ok(mesh)
    }
}

/// Per-instance colours: outer pair, inner pair, inner border, outer border.
#[derive(Debug, Clone, Copy)]
pub struct TetraStyle {
    pub colors: [ColorId; 6],
    pub widths_and_types: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct TetraInstance {
    pub transform: Mat4,
    pub style: TetraStyle,
}

const GRADIENT: f32 = 0.5;
const LINES: f32 = 0.0;
const SPACE: f32 = 1.0;

const STYLES: [([&str; 6], [f32; 4]); TETRA_COUNT] = [
    (
        ["Teal", "Green", "DarkPurple", "DarkPurple", "NeonBlue", "NavyBlue"],
        [0.22, 0.37, GRADIENT, LINES],
    ),
    (
        ["Teal", "Green", "DarkPurple", "DarkPurple", "Magenta", "Teal"],
        [0.18, 0.35, SPACE, GRADIENT],
    ),
    (
        ["Yellow", "OffWhite", "Magenta", "Red", "Red", "OffWhite"],
        [0.18, 0.35, GRADIENT, GRADIENT],
    ),
    (
        ["Teal", "OffWhite", "NavyBlue", "DarkPurple", "NavyBlue", "DarkPurple"],
        [0.22, 0.33, GRADIENT, LINES],
    ),
    (
        ["Red", "Magenta", "DarkPurple", "NavyBlue", "NeonBlue", "NavyBlue"],
        [0.15, 0.32, GRADIENT, GRADIENT],
    ),
];

const BASE_Y: f32 = -0.247_437;
const BASE_X: f32 = 0.834_486;
const BASE_Z: f32 = -0.846_755;
const MAX_POINTER_ROTATION: f32 = PI;
/// Sixty degrees per second.
const WIGGLE_RADIANS_PER_MS: f32 = (PI / 180.0) * 60.0 / 1000.0;
const WIGGLE_MAX: f32 = PI / 100.0;

#[derive(Debug)]
pub struct Scene {
    pub mesh: MeshData,
    pub instances: [TetraInstance; TETRA_COUNT],
    pub light_direction: Vec3,
    pub light_color: ColorId,
    pub shadow_color: ColorId,
    wiggle: f32,
    spin_z: f32,
}

fn lookup(palette: &Palette, slab: &MemorySlab, name: &str) -> Result<ColorId> {
    palette
        .find(slab, name)?
        .with_context(|| format!("palette has no colour named `{name}`"))
}

impl Scene {
    pub fn new(mesh: MeshData, palette: &Palette, slab: &MemorySlab) -> Result<Self> {
        let mut instances = [TetraInstance {
            transform: Mat4::IDENTITY,
            style: TetraStyle {
                colors: [lookup(palette, slab, "Teal")?; 6],
                widths_and_types: [0.0; 4],
            },
        }; TETRA_COUNT];

        for (instance, (names, widths)) in instances.iter_mut().zip(STYLES) {
            for (slot, name) in instance.style.colors.iter_mut().zip(names) {
                *slot = lookup(palette, slab, name)?;
            }
            instance.style.widths_and_types = widths;
        }

        Ok(Self {
            mesh,
            instances,
            light_direction: Vec3::new(-0.707, -1.0, 0.5).normalize(),
            light_color: lookup(palette, slab, "LightYellow")?,
            shadow_color: lookup(palette, slab, "ShadowBlue")?,
            wiggle: 0.0,
            spin_z: BASE_Z,
        })
    }

    /// Recompute every instance transform. `pointer` is in `[-1, 1]` on both
    /// axes and tilts the whole group.
    pub fn update(&mut self, elapsed_ms: f32, pointer: Vec2) {
        self.wiggle += WIGGLE_RADIANS_PER_MS * elapsed_ms;
        if self.wiggle > TAU {
            self.wiggle -= TAU;
        }

        let step = TAU / TETRA_COUNT as f32;
        for (i, instance) in self.instances.iter_mut().enumerate() {
            let offset = i as f32 * step;
            let wiggle = (self.wiggle + offset).cos() * WIGGLE_MAX;

            let y = Mat4::from_rotation_y(BASE_Y + pointer.y * MAX_POINTER_ROTATION + wiggle);
            let x = Mat4::from_rotation_x(BASE_X + pointer.x * MAX_POINTER_ROTATION + wiggle);
            let z = Mat4::from_rotation_z(self.spin_z + offset);
            instance.transform = y * x * z;
        }
    }
}

const RIG_NAMES: [&str; TETRA_COUNT + 1] = ["pivot", "tetra0", "tetra1", "tetra2", "tetra3", "tetra4"];
const RIG_NAME_BYTES: u16 = 64;
const BOB_HEIGHT: f32 = 0.5;

/// A chain of bones, one per instance below a pivot. Posing the chain lifts
/// every instance along z.
#[derive(Debug)]
pub struct Rig {
    pub armature: Armature,
    rest: ArmatureKeyFrame,
    raised: ArmatureKeyFrame,
}

impl Rig {
    pub fn new(stack: &mut SubStack, slab: &mut MemorySlab) -> Result<Self> {
        let mut armature = Armature::create(stack, RIG_NAME_BYTES)?;
        let mut rest = ArmatureKeyFrame::default();
        let mut raised = ArmatureKeyFrame::default();

        let mut parent = None;
        for (depth, name) in RIG_NAMES.into_iter().enumerate() {
            let offset = Vec3::Y * depth as f32;
            parent = Some(armature.add_bone(slab, name, Mat4::from_translation(offset), parent)?);
            rest
                .bones
                .push(BoneKeyFrame::new(offset, Vec3::ONE, Quat::IDENTITY));
            let lift = if depth == 0 { 0.0 } else { BOB_HEIGHT };
            raised
                .bones
                .push(BoneKeyFrame::new(offset + Vec3::Z * lift, Vec3::ONE, Quat::IDENTITY));
        }

        tracing::debug!(bones = armature.len(), "rig built");
        Ok(Self {
            armature,
            rest,
            raised,
        })
    }

    /// Pose the chain between rest (`weight` 0) and fully raised (1).
    pub fn pose(&self, slab: &mut MemorySlab, weight: f32) -> Result<()> {
        let pose = ArmatureKeyFrame::blend(&self.rest, &self.raised, weight);
        self.armature.apply_pose(slab, &pose)?;
        Ok(())
    }

    /// Apply each instance bone's current transform on top of the instance's
    /// own.
    pub fn apply(&self, slab: &MemorySlab, scene: &mut Scene) -> Result<()> {
        let transforms = self.armature.transforms(slab)?;
        for (instance, bone) in scene.instances.iter_mut().zip(&transforms[1..]) {
            instance.transform = *bone * instance.transform;
        }
        Ok(())
    }
}
