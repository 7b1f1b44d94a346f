//! Core renderer settings

pub mod config;

pub use config::{RendererConfig, RendererLimits, ShadowMode};
