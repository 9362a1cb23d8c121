// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Notebooks and the registry that owns them.

pub mod notebook;
pub mod registry;

pub use notebook::Notebook;
pub use registry::NotebookRegistry;
