#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

pub mod design;
pub mod gpu;
pub mod pip;
pub mod python;

pub use design::ProcessVoiceDesigner;
pub use gpu::NvidiaSmiProbe;
pub use pip::PipInstaller;
pub use python::{ProcessError, ProcessOutput, find_python};
