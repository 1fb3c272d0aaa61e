//! Backend selection
//!
//! Training and inference run on the CPU `NdArray` backend by default;
//! the `cuda` feature switches to the CUDA backend and honors the
//! `--gpu-id` CLI argument for device selection.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Resolve the compute device for a `--gpu-id` argument
///
/// A negative id selects the default device. Without the `cuda` feature
/// a non-negative id is ignored with a warning.
pub fn device(gpu_id: i64) -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    #[cfg(feature = "cuda")]
    {
        if gpu_id >= 0 {
            burn_cuda::CudaDevice::new(gpu_id as usize)
        } else {
            burn_cuda::CudaDevice::default()
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        if gpu_id >= 0 {
            tracing::warn!(
                "GPU {} requested but the cuda feature is not enabled, running on CPU",
                gpu_id
            );
        }
        burn::backend::ndarray::NdArrayDevice::Cpu
    }
}

/// Human-readable name of the active backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
