//! Error types for lattice setup, device sessions and case files.

use thiserror::Error;

/// Result type for fallible lattice operations.
pub type Result<T> = std::result::Result<T, LbmError>;

/// Errors raised at session creation, grid construction and case I/O.
///
/// Stepping an existing lattice never produces one of these from the
/// numerics; only device readback can fail once a session exists.
#[derive(Error, Debug)]
pub enum LbmError {
    /// No adapter able to run the compute kernels was found.
    #[error("no capable accelerator adapter found")]
    AdapterUnavailable,

    /// The adapter refused to open a device.
    #[error("failed to create accelerator device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// A device buffer could not be allocated.
    #[error("device allocation failed: {0}")]
    Allocation(String),

    /// The grid needs more workgroups than a single dispatch allows.
    #[error("grid of {cells} cells exceeds the device dispatch limit of {limit} cells")]
    GridTooLarge { cells: usize, limit: usize },

    /// A flat buffer does not match the grid dimensions.
    #[error("buffer holds {actual} values but a {height}x{width}x{channels} grid needs {expected}")]
    BufferSize {
        height: usize,
        width: usize,
        channels: usize,
        expected: usize,
        actual: usize,
    },

    /// A grid without a single cell cannot be stepped.
    #[error("grid of {height}x{width} cells is empty")]
    EmptyGrid { height: usize, width: usize },

    /// The obstacle mask and the distribution grid disagree on dimensions.
    #[error("obstacle mask is {mask_height}x{mask_width} but the grid is {height}x{width}")]
    DimensionMismatch {
        height: usize,
        width: usize,
        mask_height: usize,
        mask_width: usize,
    },

    /// Copying device results back to the host failed.
    #[error("failed to read back device buffer: {0}")]
    Readback(String),

    /// The dedicated rayon pool could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A required case parameter is absent.
    #[error("missing case parameter `{0}`")]
    MissingParameter(String),

    /// A case parameter could not be parsed.
    #[error("invalid value `{value}` for case parameter `{key}`")]
    InvalidParameter { key: String, value: String },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LbmError {
    /// True for the one initialization failure callers are expected to
    /// recover from by falling back to a CPU engine.
    pub fn is_adapter_unavailable(&self) -> bool {
        matches!(self, Self::AdapterUnavailable)
    }

    pub fn invalid_parameter(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_unavailable_is_the_recoverable_error() {
        assert!(LbmError::AdapterUnavailable.is_adapter_unavailable());
        assert!(!LbmError::MissingParameter("height".into()).is_adapter_unavailable());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let error = LbmError::DimensionMismatch {
            height: 4,
            width: 5,
            mask_height: 4,
            mask_width: 6,
        };
        assert_eq!(
            error.to_string(),
            "obstacle mask is 4x6 but the grid is 4x5"
        );
        let error = LbmError::EmptyGrid { height: 0, width: 4 };
        assert_eq!(error.to_string(), "grid of 0x4 cells is empty");
        let error = LbmError::invalid_parameter("viscosity", "abc");
        assert_eq!(
            error.to_string(),
            "invalid value `abc` for case parameter `viscosity`"
        );
    }
}
