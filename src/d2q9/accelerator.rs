//! Accelerator-resident engine.
//!
//! A [`Session`] uploads the lattice once, keeps both distribution buffers
//! on the device and only copies the current state back to the caller's
//! host buffer when a [`Session::step`] call returns. The stateless
//! [`collide_and_stream`] builds and tears down a session per call.

pub mod buffers;
pub mod device;
pub mod kernels;
pub mod shaders;

use super::*;
use buffers::DeviceLattice;
use device::DeviceContext;
use kernels::{Dispatch, Kernels};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Position of a session inside one lattice step.
///
/// Each non-idle stage is encoded as its own compute pass, so a stage only
/// starts once the writes of the previous one are visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SettingBoundaries,
    Colliding,
    Streaming,
    BouncingBack,
}

impl Stage {
    /// The four stages of one step, in order.
    pub const STEP: [Stage; 4] = [
        Stage::SettingBoundaries,
        Stage::Colliding,
        Stage::Streaming,
        Stage::BouncingBack,
    ];

    pub fn next(self) -> Stage {
        match self {
            Stage::Idle => Stage::SettingBoundaries,
            Stage::SettingBoundaries => Stage::Colliding,
            Stage::Colliding => Stage::Streaming,
            Stage::Streaming => Stage::BouncingBack,
            Stage::BouncingBack => Stage::Idle,
        }
    }

    pub fn entry_point(self) -> &'static str {
        match self {
            Stage::Idle => "",
            Stage::SettingBoundaries => "set_boundaries",
            Stage::Colliding => "collide",
            Stage::Streaming => "stream",
            Stage::BouncingBack => "bounce_back",
        }
    }
}

/// Lattice state living on the device between steps.
///
/// The session holds the caller's host buffer for its whole life and
/// rewrites it at the end of every [`Session::step`]. Only one caller may
/// drive a session; `step` takes `&mut self`.
pub struct Session<'a> {
    host: &'a mut [Float],
    height: usize,
    width: usize,
    parameters: Parameters,
    context: Arc<DeviceContext>,
    kernels: Kernels,
    dispatch: Dispatch,
    lattice: DeviceLattice,
    current: usize,
    stage: Stage,
    steps_taken: usize,
}

impl<'a> Session<'a> {
    /// Opens a device and uploads `host` (height x width x 9) and `obstacle`.
    ///
    /// [`LbmError::AdapterUnavailable`] is the expected failure on machines
    /// without a capable adapter.
    pub fn new(
        host: &'a mut [Float],
        obstacle: &ObstacleMask,
        height: usize,
        width: usize,
        viscosity: Float,
    ) -> Result<Self> {
        obstacle.check_dimensions(height, width)?;
        Self::with_parameters(host, obstacle, Parameters::new(viscosity))
    }

    pub fn with_parameters(
        host: &'a mut [Float],
        obstacle: &ObstacleMask,
        parameters: Parameters,
    ) -> Result<Self> {
        check_shape(host, obstacle)?;
        let context = Arc::new(DeviceContext::request()?);
        Self::with_context(context, host, obstacle, parameters)
    }

    /// Builds a session on an already opened device.
    pub fn with_context(
        context: Arc<DeviceContext>,
        host: &'a mut [Float],
        obstacle: &ObstacleMask,
        parameters: Parameters,
    ) -> Result<Self> {
        check_shape(host, obstacle)?;
        let (height, width) = (obstacle.height(), obstacle.width());
        let dispatch = Dispatch::new(height, width, context.limits())?;
        let kernels = Kernels::new(&context.device);
        let lattice = DeviceLattice::upload(&context, &kernels, host, obstacle, &parameters)?;

        info!(
            "session on {}: {height}x{width}, omega {:.4}, {} solid cells",
            context.adapter_name(),
            parameters.omega(),
            obstacle.solid_count()
        );

        Ok(Self {
            host,
            height,
            width,
            parameters,
            context,
            kernels,
            dispatch,
            lattice,
            current: 0,
            stage: Stage::Idle,
            steps_taken: 0,
        })
    }

    fn advance(&mut self, stage: Stage) {
        debug_assert_eq!(self.stage.next(), stage, "stage out of order");
        trace!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn encode_stage(&self, encoder: &mut wgpu::CommandEncoder, stage: Stage) {
        let Some(pipeline) = self.kernels.pipeline(stage) else {
            return;
        };
        let (x, y, z) = self.dispatch.workgroups(stage);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(stage.entry_point()),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, self.lattice.bind_group(self.current), &[]);
        pass.dispatch_workgroups(x, y, z);
    }

    /// Advances the lattice by `steps` and refreshes the host buffer.
    ///
    /// All steps go into a single submission followed by one wait. Only the
    /// readback can fail; the numerics themselves never do.
    pub fn step(&mut self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Ok(());
        }
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lattice steps"),
            });

        for _ in 0..steps {
            for stage in Stage::STEP {
                self.advance(stage);
                self.encode_stage(&mut encoder, stage);
            }
            self.advance(Stage::Idle);
            self.current = 1 - self.current;
        }

        self.lattice.encode_readback(&mut encoder, self.current);
        self.context.queue.submit(Some(encoder.finish()));
        self.lattice.read_staging(&self.context, self.host)?;

        self.steps_taken += steps;
        debug!("{steps} steps done, {} in total", self.steps_taken);
        Ok(())
    }

    /// Re-applies the inflow equilibrium to the edges without stepping.
    pub fn refresh_boundaries(&mut self) -> Result<()> {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("boundary refresh"),
            });
        self.advance(Stage::SettingBoundaries);
        self.encode_stage(&mut encoder, Stage::SettingBoundaries);
        self.stage = Stage::Idle;
        self.lattice.encode_readback(&mut encoder, self.current);
        self.context.queue.submit(Some(encoder.finish()));
        self.lattice.read_staging(&self.context, self.host)
    }

    /// The host copy as of the last completed call.
    pub fn host_state(&self) -> &[Float] {
        &self.host[..]
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn adapter_name(&self) -> &str {
        self.context.adapter_name()
    }

    /// Downloads the final state into the host buffer and releases every
    /// device allocation.
    pub fn terminate(mut self) -> Result<()> {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("final readback"),
            });
        self.lattice.encode_readback(&mut encoder, self.current);
        self.context.queue.submit(Some(encoder.finish()));
        self.lattice.read_staging(&self.context, self.host)?;
        self.stage = Stage::Idle;
        info!("session terminated after {} steps", self.steps_taken);
        Ok(())
    }
}

/// One-shot accelerator run: open a device, upload, step, download, free.
pub fn collide_and_stream(
    d2q9: &mut [Float],
    obstacle: &ObstacleMask,
    parameters: &Parameters,
    steps: usize,
) -> Result<()> {
    let mut session = Session::with_parameters(d2q9, obstacle, *parameters)?;
    session.step(steps)?;
    session.terminate()
}

/// Stateless accelerator engine behind [`CollideAndStream`].
///
/// The device stays open between calls; lattice buffers do not.
pub struct AcceleratorEngine {
    pub parameters: Parameters,
    context: Arc<DeviceContext>,
}

impl AcceleratorEngine {
    pub fn new(parameters: Parameters) -> Result<Self> {
        Ok(Self::with_context(parameters, Arc::new(DeviceContext::request()?)))
    }

    pub fn with_context(parameters: Parameters, context: Arc<DeviceContext>) -> Self {
        Self { parameters, context }
    }

    pub fn adapter_name(&self) -> &str {
        self.context.adapter_name()
    }
}

impl CollideAndStream for AcceleratorEngine {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn collide_and_stream(
        &mut self,
        d2q9: &mut [Float],
        obstacle: &ObstacleMask,
        steps: usize,
    ) -> Result<()> {
        let mut session =
            Session::with_context(self.context.clone(), d2q9, obstacle, self.parameters)?;
        session.step(steps)?;
        session.terminate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_cycle_back_to_idle() {
        let mut stage = Stage::Idle;
        for expected in Stage::STEP {
            stage = stage.next();
            assert_eq!(stage, expected);
        }
        assert_eq!(stage.next(), Stage::Idle);
        assert_eq!(Stage::Idle.entry_point(), "");
    }
}
