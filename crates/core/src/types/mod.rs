//! Core types for Display Toggle.
//!
//! This module provides type-safe wrappers for the catalog domain.

pub mod catalog;
pub mod display_flag;
pub mod environment;
pub mod id;
pub mod resource;

pub use catalog::{Category, Product, ProductImage};
pub use display_flag::{DisplayFlag, DisplayFlagError};
pub use environment::{Environment, EnvironmentError};
pub use id::*;
pub use resource::{LIST_KEY_PRIORITY, ListEnvelope, Resource};
