//! GPU-free backend that records every command for assertions.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use terravox_core::{ProgramHandle, TextureHandle};

use crate::backend::{
    GpuBackend, ImageAccess, MemoryBarrier, RasterState, SliceParams, UniformValue,
    VolumeDescriptor, Viewport,
};
use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Allocate {
        handle: TextureHandle,
        resolution: u32,
        mip_levels: u32,
    },
    Release(TextureHandle),
    Clear(TextureHandle),
    SetViewport(Viewport),
    SetRaster(RasterState),
    BindImage {
        unit: u32,
        handle: TextureHandle,
        access: ImageAccess,
    },
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: UniformValue,
    },
    BeginPass(String),
    EndPass,
    Draw,
    Barrier(MemoryBarrier),
    GenerateMipmaps(TextureHandle),
    DrawSlice {
        handle: TextureHandle,
        params: SliceParams,
    },
    PushErrorScope,
    PopErrorScope,
}

pub struct RecordingBackend {
    pub commands: Vec<Command>,
    /// Every allocation fails.
    pub fail_allocations: bool,
    /// Allocations succeed this many times, then fail.
    pub fail_after: Option<usize>,
    /// Returned by the next `pop_error_scope`.
    pub pending_error: Option<String>,
    pub(crate) live: HashSet<TextureHandle>,
    pub(crate) next_handle: u32,
    pub(crate) allocations: usize,
    pub(crate) releases: Rc<Cell<usize>>,
    pub(crate) viewport: Viewport,
    pub(crate) raster: RasterState,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            fail_allocations: false,
            fail_after: None,
            pending_error: None,
            live: HashSet::new(),
            next_handle: 1,
            allocations: 0,
            releases: Rc::new(Cell::new(0)),
            viewport: Viewport {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            },
            raster: RasterState::DEFAULT,
        }
    }
}

impl RecordingBackend {
    /// Called from draw callbacks to mark a draw.
    pub fn record_draw(&mut self) {
        self.commands.push(Command::Draw);
    }

    pub fn live_volumes(&self) -> usize {
        self.live.len()
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Release count that outlives the backend.
    pub fn release_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.releases)
    }

    pub fn uniform_writes(&self, program: ProgramHandle, name: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::SetUniform { program: p, name: n, .. } if *p == program && n == name))
            .count()
    }

    pub fn last_uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetUniform {
                program: p,
                name: n,
                value,
            } if *p == program && n == name => Some(*value),
            _ => None,
        })
    }
}

impl GpuBackend for RecordingBackend {
    fn allocate_volume(&mut self, desc: &VolumeDescriptor) -> Result<TextureHandle, RenderError> {
        let exhausted = self.fail_after.is_some_and(|n| self.allocations >= n);
        if self.fail_allocations || exhausted {
            return Err(RenderError::AllocationFailed {
                label: desc.label.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.allocations += 1;
        self.live.insert(handle);
        self.commands.push(Command::Allocate {
            handle,
            resolution: desc.resolution,
            mip_levels: desc.mip_levels,
        });
        Ok(handle)
    }

    fn release_volume(&mut self, handle: TextureHandle) {
        if self.live.remove(&handle) {
            self.releases.set(self.releases.get() + 1);
        }
        self.commands.push(Command::Release(handle));
    }

    fn clear_volume(&mut self, handle: TextureHandle) {
        self.commands.push(Command::Clear(handle));
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.commands.push(Command::SetViewport(viewport));
    }

    fn raster_state(&self) -> RasterState {
        self.raster
    }

    fn set_raster_state(&mut self, state: RasterState) {
        self.raster = state;
        self.commands.push(Command::SetRaster(state));
    }

    fn bind_image(&mut self, unit: u32, handle: TextureHandle, access: ImageAccess) {
        self.commands.push(Command::BindImage {
            unit,
            handle,
            access,
        });
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        self.commands.push(Command::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn begin_pass(&mut self, label: &str) {
        self.commands.push(Command::BeginPass(label.to_string()));
    }

    fn end_pass(&mut self) {
        self.commands.push(Command::EndPass);
    }

    fn memory_barrier(&mut self, barrier: MemoryBarrier) {
        self.commands.push(Command::Barrier(barrier));
    }

    fn generate_mipmaps(&mut self, handle: TextureHandle) {
        self.commands.push(Command::GenerateMipmaps(handle));
    }

    fn draw_volume_slice(&mut self, handle: TextureHandle, params: &SliceParams) {
        self.commands.push(Command::DrawSlice {
            handle,
            params: *params,
        });
    }

    fn push_error_scope(&mut self) {
        self.commands.push(Command::PushErrorScope);
    }

    fn pop_error_scope(&mut self) -> Option<String> {
        self.commands.push(Command::PopErrorScope);
        self.pending_error.take()
    }
}
