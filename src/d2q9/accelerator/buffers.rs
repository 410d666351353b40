//! Device-resident lattice state: two ping-pong buffers, the obstacle mask,
//! the parameter block and a staging buffer for readback.

use super::device::DeviceContext;
use super::kernels::{lattice_bytes, Kernels};
use crate::d2q9::Parameters;
use crate::error::{LbmError, Result};
use crate::global_variables::*;
use crate::obstacle::ObstacleMask;
use std::sync::mpsc;
use tracing::debug;
use wgpu::util::DeviceExt;

/// Uniform block read by every kernel; layout matches `Params` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct DeviceParams {
    height: u32,
    width: u32,
    omega: f32,
    density_floor: f32,
    inflow_x: f32,
    inflow_y: f32,
    inflow_density: f32,
    _padding: u32,
}

impl DeviceParams {
    pub(crate) fn new(height: usize, width: usize, parameters: &Parameters) -> Self {
        Self {
            height: height as u32,
            width: width as u32,
            omega: parameters.omega(),
            density_floor: DENSITY_FLOOR,
            inflow_x: parameters.inflow_velocity[0],
            inflow_y: parameters.inflow_velocity[1],
            inflow_density: parameters.inflow_density,
            _padding: 0,
        }
    }
}

pub(crate) struct DeviceLattice {
    params: wgpu::Buffer,
    lattice: [wgpu::Buffer; 2],
    obstacle: wgpu::Buffer,
    staging: wgpu::Buffer,
    /// `bind_groups[i]` reads `lattice[i]` as current and writes `lattice[1 - i]`.
    bind_groups: [wgpu::BindGroup; 2],
    size: u64,
}

impl DeviceLattice {
    /// Allocates every device buffer and uploads `host` and `obstacle`.
    pub(crate) fn upload(
        context: &DeviceContext,
        kernels: &Kernels,
        host: &[Float],
        obstacle: &ObstacleMask,
        parameters: &Parameters,
    ) -> Result<Self> {
        let (height, width) = (obstacle.height(), obstacle.width());
        let size = lattice_bytes(height, width);
        let limits = context.limits();
        if size > limits.max_storage_buffer_binding_size as u64 || size > limits.max_buffer_size {
            return Err(LbmError::Allocation(format!(
                "{size} bytes per lattice buffer exceeds the device limit"
            )));
        }

        let device = &context.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lattice params"),
            contents: bytemuck::bytes_of(&DeviceParams::new(height, width, parameters)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let lattice = [
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lattice a"),
                contents: bytemuck::cast_slice(host),
                usage,
            }),
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lattice b"),
                size,
                usage,
                mapped_at_creation: false,
            }),
        ];

        let mask: Vec<u32> = obstacle.as_bytes().iter().map(|&cell| cell as u32).collect();
        let obstacle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("obstacle"),
            contents: bytemuck::cast_slice(&mask),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lattice staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(LbmError::Allocation(error.to_string()));
        }

        let bind_group = |current: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(if current == 0 { "lattice a -> b" } else { "lattice b -> a" }),
                layout: &kernels.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: lattice[current].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: lattice[1 - current].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: obstacle_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [bind_group(0), bind_group(1)];

        debug!("uploaded {height}x{width} lattice ({size} bytes per buffer)");

        Ok(Self {
            params,
            lattice,
            obstacle: obstacle_buffer,
            staging,
            bind_groups,
            size,
        })
    }

    pub(crate) fn bind_group(&self, current: usize) -> &wgpu::BindGroup {
        &self.bind_groups[current]
    }

    /// Records a copy of `lattice[current]` into the staging buffer.
    pub(crate) fn encode_readback(&self, encoder: &mut wgpu::CommandEncoder, current: usize) {
        encoder.copy_buffer_to_buffer(&self.lattice[current], 0, &self.staging, 0, self.size);
    }

    /// Waits for the device and copies the staging buffer into `host`.
    pub(crate) fn read_staging(&self, context: &DeviceContext, host: &mut [Float]) -> Result<()> {
        let slice = self.staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        context.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|e| LbmError::Readback(e.to_string()))?
            .map_err(|e| LbmError::Readback(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            host.copy_from_slice(bytemuck::cast_slice(&data));
        }
        self.staging.unmap();
        Ok(())
    }
}

impl Drop for DeviceLattice {
    fn drop(&mut self) {
        self.params.destroy();
        for buffer in &self.lattice {
            buffer.destroy();
        }
        self.obstacle.destroy();
        self.staging.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_block_is_32_bytes() {
        assert_eq!(std::mem::size_of::<DeviceParams>(), 32);
        let params = DeviceParams::new(4, 6, &Parameters::default());
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&params));
        assert_eq!(&words[..2], &[4, 6]);
        assert_eq!(f32::from_bits(words[2]), Parameters::default().omega());
    }
}
