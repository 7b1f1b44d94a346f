//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the renderer:
//! - Math types and projection helpers
//! - Bounded collections and handle encoding
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
