use glam::Mat4;
use terravox_core::ProgramHandle;

/// One drawable: its model transform and the program it is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub transform: Mat4,
    pub program: ProgramHandle,
}

/// Ordered drawables of the current frame. Rebuilt every frame and read by
/// both the voxelizer and the G-buffer prepass.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the allocation for the next frame.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn push(&mut self, transform: Mat4, program: ProgramHandle) {
        self.items.push(DrawItem { transform, program });
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parallel transform and program lists, in draw order.
    pub fn split(&self) -> (Vec<Mat4>, Vec<ProgramHandle>) {
        self.items.iter().map(|i| (i.transform, i.program)).unzip()
    }
}
