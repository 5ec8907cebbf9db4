//! Hot-fix Binary Images
//!
//! This module provides the on-disk formats the execution domain parses:
//! the module image (type table and native binding table) and the optional
//! paired symbol image (source locations).

pub mod encoder;
pub mod module;
pub mod symbols;

pub use encoder::{DecodeError, ImageReader, ImageWriter};
pub use module::{MethodDef, ModuleError, ModuleImage, TypeDef};
pub use symbols::{MethodSymbols, SourceLocation, SymbolError, SymbolImage, TypeSymbols};
