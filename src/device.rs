//! Compute device selection for the candle backends
//!
//! GPU backends exist only when the crate is built with the `metal` or
//! `cuda` feature; without them every preference except `cpu` falls back
//! or fails.

use crate::config::DevicePreference;
use crate::error::{Error, Result};
use candle_core::Device;
use tracing::debug;

/// Pick the candle device for a model.
///
/// An explicit GPU preference fails when that backend is missing or cannot
/// start; `auto` quietly tries each compiled GPU and settles for the CPU.
pub fn resolve_device(preference: &DevicePreference) -> Result<Device> {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Metal => open_metal()?,
        DevicePreference::Cuda => open_cuda()?,
        DevicePreference::Auto => open_metal().or_else(|_| open_cuda()).unwrap_or(Device::Cpu),
    };
    debug!(preference = preference.name(), device = device_name(&device), "resolved device");
    Ok(device)
}

#[cfg(feature = "metal")]
fn open_metal() -> Result<Device> {
    Device::new_metal(0).map_err(|e| Error::Config(format!("Metal device unavailable: {}", e)))
}

#[cfg(not(feature = "metal"))]
fn open_metal() -> Result<Device> {
    Err(missing_backend("metal"))
}

#[cfg(feature = "cuda")]
fn open_cuda() -> Result<Device> {
    Device::new_cuda(0).map_err(|e| Error::Config(format!("CUDA device unavailable: {}", e)))
}

#[cfg(not(feature = "cuda"))]
fn open_cuda() -> Result<Device> {
    Err(missing_backend("cuda"))
}

#[allow(dead_code)]
fn missing_backend(feature: &str) -> Error {
    Error::Config(format!(
        "device '{}' requested but finchat was built without it (cargo build --features {})",
        feature, feature
    ))
}

/// Short label for logs and `finchat info`
pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA",
        Device::Metal(_) => "Metal",
    }
}

/// GPU backends compiled into this build
pub fn gpu_support_info() -> GpuSupportInfo {
    let mut backends = Vec::new();
    if cfg!(feature = "metal") {
        backends.push("Metal");
    }
    if cfg!(feature = "cuda") {
        backends.push("CUDA");
    }
    GpuSupportInfo { backends }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuSupportInfo {
    pub backends: Vec<&'static str>,
}

impl GpuSupportInfo {
    pub fn any_gpu(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.backends.is_empty() {
            "none, CPU only".to_string()
        } else {
            self.backends.join(" + ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_preference_gives_cpu() {
        let device = resolve_device(&DevicePreference::Cpu).unwrap();
        assert_eq!(device_name(&device), "CPU");
    }

    #[test]
    fn test_auto_never_fails() {
        assert!(resolve_device(&DevicePreference::Auto).is_ok());
    }

    #[test]
    fn test_missing_backend_is_config_error() {
        let info = gpu_support_info();
        if !info.backends.contains(&"CUDA") {
            let err = resolve_device(&DevicePreference::Cuda).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        }
        if !info.any_gpu() {
            assert_eq!(info.summary(), "none, CPU only");
        }
    }
}
