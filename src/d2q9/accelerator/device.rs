//! Adapter selection and the device/queue pair shared by sessions.

use crate::error::{LbmError, Result};
use tracing::{debug, info};

/// An open device, its queue and the limits it was opened with.
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl DeviceContext {
    /// Blocking form of [`DeviceContext::request_async`].
    pub fn request() -> Result<Self> {
        pollster::block_on(Self::request_async())
    }

    /// Opens the preferred high-performance adapter.
    ///
    /// Fails with [`LbmError::AdapterUnavailable`] when the platform has no
    /// adapter able to run compute work; callers fall back to a CPU engine.
    pub async fn request_async() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(LbmError::AdapterUnavailable)?;

        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            debug!("adapter {} has no compute shaders", info.name);
            return Err(LbmError::AdapterUnavailable);
        }

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lbm-tunnel-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        info!("accelerator adapter: {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            info,
            limits,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.info.name
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }
}

/// What the `devices` command prints for each adapter.
#[derive(Debug, Clone)]
pub struct AdapterSummary {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub compute: bool,
}

/// Every adapter the platform exposes, capable or not.
pub fn enumerate_adapters() -> Vec<AdapterSummary> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            let compute = adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
            AdapterSummary {
                name: info.name,
                backend: info.backend,
                device_type: info.device_type,
                compute,
            }
        })
        .collect()
}
