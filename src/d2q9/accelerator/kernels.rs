//! Compiled pipelines for the four lattice kernels.

use super::shaders::{lattice_source, COLLIDE_WORKGROUP_SIZE, GRID_WORKGROUP_SIZE};
use super::Stage;
use crate::d2q9::Q;
use crate::error::{LbmError, Result};

pub(crate) struct Kernels {
    pub(crate) layout: wgpu::BindGroupLayout,
    set_boundaries: wgpu::ComputePipeline,
    collide: wgpu::ComputePipeline,
    stream: wgpu::ComputePipeline,
    bounce_back: wgpu::ComputePipeline,
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl Kernels {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lattice kernels"),
            source: wgpu::ShaderSource::Wgsl(lattice_source().into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lattice bind group layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: false }),
                buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
                buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: true }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lattice pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            set_boundaries: pipeline(Stage::SettingBoundaries.entry_point()),
            collide: pipeline(Stage::Colliding.entry_point()),
            stream: pipeline(Stage::Streaming.entry_point()),
            bounce_back: pipeline(Stage::BouncingBack.entry_point()),
            layout,
        }
    }

    /// Pipeline run while the session is in `stage`; `Idle` runs nothing.
    pub(crate) fn pipeline(&self, stage: Stage) -> Option<&wgpu::ComputePipeline> {
        match stage {
            Stage::Idle => None,
            Stage::SettingBoundaries => Some(&self.set_boundaries),
            Stage::Colliding => Some(&self.collide),
            Stage::Streaming => Some(&self.stream),
            Stage::BouncingBack => Some(&self.bounce_back),
        }
    }
}

/// Workgroup counts for each stage over a `height` x `width` lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dispatch {
    pub(crate) cells: u32,
    pub(crate) columns: u32,
    pub(crate) rows: u32,
}

impl Dispatch {
    /// Fails with [`LbmError::GridTooLarge`] when a stage would need more
    /// workgroups along one dimension than the device accepts.
    pub(crate) fn new(height: usize, width: usize, limits: &wgpu::Limits) -> Result<Self> {
        let max = limits.max_compute_workgroups_per_dimension as usize;
        let cells = height * width;
        let cell_groups = cells.div_ceil(COLLIDE_WORKGROUP_SIZE as usize);
        let columns = width.div_ceil(GRID_WORKGROUP_SIZE as usize);
        let rows = height.div_ceil(GRID_WORKGROUP_SIZE as usize);
        if cell_groups > max || columns > max || rows > max {
            return Err(LbmError::GridTooLarge {
                cells,
                limit: max * COLLIDE_WORKGROUP_SIZE as usize,
            });
        }
        Ok(Self {
            cells: cell_groups as u32,
            columns: columns as u32,
            rows: rows as u32,
        })
    }

    pub(crate) fn workgroups(&self, stage: Stage) -> (u32, u32, u32) {
        match stage {
            Stage::Idle => (0, 0, 0),
            Stage::Colliding => (self.cells, 1, 1),
            _ => (self.columns, self.rows, 1),
        }
    }
}

/// Bytes of one lattice buffer.
pub(crate) fn lattice_bytes(height: usize, width: usize) -> u64 {
    (height * width * Q * std::mem::size_of::<f32>()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_the_whole_grid() {
        let limits = wgpu::Limits::default();
        let dispatch = Dispatch::new(256, 640, &limits).unwrap();
        assert_eq!(dispatch.workgroups(Stage::Colliding), (5120, 1, 1));
        assert_eq!(dispatch.workgroups(Stage::Streaming), (40, 16, 1));

        let ragged = Dispatch::new(17, 33, &limits).unwrap();
        assert_eq!(ragged.workgroups(Stage::BouncingBack), (3, 2, 1));
        assert_eq!(ragged.workgroups(Stage::Colliding), (18, 1, 1));
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let limits = wgpu::Limits {
            max_compute_workgroups_per_dimension: 4,
            ..wgpu::Limits::default()
        };
        assert!(Dispatch::new(8, 16, &limits).is_ok());
        assert!(matches!(
            Dispatch::new(8, 17, &limits),
            Err(LbmError::GridTooLarge {
                cells: 136,
                limit: 128
            })
        ));
    }

    #[test]
    fn lattice_buffers_hold_nine_floats_per_cell() {
        assert_eq!(lattice_bytes(2, 3), 2 * 3 * 9 * 4);
    }
}
