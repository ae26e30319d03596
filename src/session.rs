use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    DirectMLExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::Deserialize;

/// Compute device used for every session created in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
    CoreMl,
    DirectMl,
}

impl Device {
    fn execution_provider(self) -> ExecutionProviderDispatch {
        match self {
            Device::Cpu => CPUExecutionProvider::default().build(),
            Device::Cuda(id) => CUDAExecutionProvider::default().with_device_id(id).build(),
            Device::CoreMl => CoreMLExecutionProvider::default().build(),
            Device::DirectMl => DirectMLExecutionProvider::default().build(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
            Device::CoreMl => f.write_str("coreml"),
            Device::DirectMl => f.write_str("directml"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown device '{0}', expected cpu, cuda, cuda:<n>, coreml or directml")]
pub struct UnknownDevice(String);

impl FromStr for Device {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            "coreml" => Ok(Device::CoreMl),
            "directml" => Ok(Device::DirectMl),
            _ => s
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| UnknownDevice(s.to_string())),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = UnknownDevice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Options applied when building an inference session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub device: Device,
    pub intra_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            intra_threads: 1,
        }
    }
}

pub fn create_session(model_path: &Path, options: &SessionOptions) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(options.intra_threads)?
        .with_inter_threads(1)?
        .with_execution_providers([options.device.execution_provider()])?
        .commit_from_file(model_path)?;
    Ok(session)
}
