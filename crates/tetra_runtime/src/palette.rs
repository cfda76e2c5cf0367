//! Named colours stored in the resident arena.
//!
//! The palette owns three allocations: a packed name buffer, a table of
//! `(start, len)` spans into it, and the colours themselves. Lookups go
//! through the slab, so the palette handle is plain data.

use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};
use tetra_core::memory::{Allocation, MemoryError, MemorySlab, SubStack};
use thiserror::Error;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn rgb8([r, g, b]: [u8; 3]) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
            a: 1.0,
        }
    }

    /// Colour with the hue rotated half a turn.
    pub fn complement(self) -> Self {
        let mut hsv = Hsv::from(self);
        hsv.h += PI;
        if hsv.h > TAU {
            hsv.h -= TAU;
        }
        Color::from(hsv)
    }
}

/// Hue in radians, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl From<Color> for Hsv {
    fn from(c: Color) -> Self {
        let max = c.r.max(c.g).max(c.b);
        let min = c.r.min(c.g).min(c.b);
        let chroma = max - min;

        let sector = if chroma == 0.0 {
            0.0
        } else if max == c.r {
            ((c.g - c.b) / chroma).rem_euclid(6.0)
        } else if max == c.g {
            (c.b - c.r) / chroma + 2.0
        } else {
            (c.r - c.g) / chroma + 4.0
        };

        let s = if max > 0.0 { chroma / max } else { 0.0 };
        Hsv {
            h: sector * (TAU / 6.0),
            s,
            v: max,
        }
    }
}

impl From<Hsv> for Color {
    fn from(c: Hsv) -> Self {
        let chroma = c.v * c.s;
        let h_prime = c.h / (TAU / 6.0);
        let x = chroma * (1.0 - ((h_prime % 2.0) - 1.0).abs());

        let (r, g, b) = match h_prime {
            h if (0.0..1.0).contains(&h) => (chroma, x, 0.0),
            h if (1.0..2.0).contains(&h) => (x, chroma, 0.0),
            h if (2.0..3.0).contains(&h) => (0.0, chroma, x),
            h if (3.0..4.0).contains(&h) => (0.0, x, chroma),
            h if (4.0..5.0).contains(&h) => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        let min = c.v - chroma;
        Color {
            r: r + min,
            g: g + min,
            b: b + min,
            a: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorId(u8);

impl ColorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("palette is full ({0} colours)")]
    Full(u8),
    #[error("name buffer cannot fit `{0}`")]
    NameBufferFull(String),
    #[error("colour `{0}` is already in the palette")]
    Duplicate(String),
    #[error("resident stack exhausted while creating the palette")]
    OutOfMemory,
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    names: Allocation,
    spans: Allocation,
    colors: Allocation,
    capacity: u8,
    len: u8,
    next_name: u16,
}

impl Palette {
    /// Reserve room for `max_colors` colours whose names total at most
    /// `name_buffer_size` bytes.
    pub fn create(
        stack: &mut SubStack,
        max_colors: u8,
        name_buffer_size: u16,
    ) -> Result<Self, PaletteError> {
        let names = stack
            .allocate(usize::from(name_buffer_size))
            .ok_or(PaletteError::OutOfMemory)?;
        let spans = stack
            .allocate_array::<[u16; 2]>(usize::from(max_colors))
            .ok_or(PaletteError::OutOfMemory)?;
        let colors = stack
            .allocate_array::<Color>(usize::from(max_colors))
            .ok_or(PaletteError::OutOfMemory)?;

        Ok(Self {
            names,
            spans,
            colors,
            capacity: max_colors,
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

    pub fn insert(
        &mut self,
        slab: &mut MemorySlab,
        name: &str,
        color: Color,
    ) -> Result<ColorId, PaletteError> {
        if self.len == self.capacity {
            return Err(PaletteError::Full(self.capacity));
        }
        if self.find(slab, name)?.is_some() {
            return Err(PaletteError::Duplicate(name.to_owned()));
        }
        let start = usize::from(self.next_name);
        let end = start + name.len();
        if end > self.names.len() || end > usize::from(u16::MAX) {
            return Err(PaletteError::NameBufferFull(name.to_owned()));
        }

        let index = usize::from(self.len);
        slab.bytes_mut(self.names)?[start..end].copy_from_slice(name.as_bytes());
        slab.slice_mut::<[u16; 2]>(self.spans)?[index] = [start as u16, name.len() as u16];
        slab.slice_mut::<Color>(self.colors)?[index] = color;

        self.next_name = end as u16;
        self.len += 1;
        tracing::trace!(name, index, "colour added to palette");
        Ok(ColorId(index as u8))
    }

    pub fn find(&self, slab: &MemorySlab, name: &str) -> Result<Option<ColorId>, PaletteError> {
        let names = slab.bytes(self.names)?;
        let spans = &slab.slice::<[u16; 2]>(self.spans)?[..self.len()];
        let found = spans.iter().position(|&[start, len]| {
            let start = usize::from(start);
            &names[start..start + usize::from(len)] == name.as_bytes()
        });
        Ok(found.map(|i| ColorId(i as u8)))
    }

    pub fn color(&self, slab: &MemorySlab, id: ColorId) -> Result<Color, PaletteError> {
        Ok(slab.slice::<Color>(self.colors)?[id.index()])
    }

    /// Look a colour up by name.
    pub fn get(&self, slab: &MemorySlab, name: &str) -> Result<Option<Color>, PaletteError> {
        match self.find(slab, name)? {
            Some(id) => self.color(slab, id).map(Some),
            None => Ok(None),
        }
    }
}

/// Colours every scene uses, inserted at start-up.
pub const SCENE_COLORS: [(&str, [u8; 3]); 11] = [
    ("Yellow", [248, 233, 53]),
    ("OffWhite", [255, 250, 243]),
    ("Magenta", [230, 22, 120]),
    ("Red", [241, 8, 21]),
    ("NeonBlue", [64, 218, 244]),
    ("NavyBlue", [6, 23, 102]),
    ("Teal", [61, 184, 205]),
    ("Green", [45, 172, 91]),
    ("DarkPurple", [43, 14, 39]),
    ("LightYellow", [252, 249, 114]),
    ("ShadowBlue", [2, 4, 98]),
];
