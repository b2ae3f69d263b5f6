//! core components and types used throughout this library

/// Validated histogram settings.
pub mod config;

/// Geometry that maps values to counts array indices and back.
pub mod layout;
