//! Girscan Core
//!
//! The middle of a GObject-Introspection scanner: everything between a C
//! front-end's declaration stream and the GIR document.
//! - **Comments**: GTK-Doc block parser and writer (`annotation` module)
//! - **Model**: node arena, namespaces and type references (`ast` module)
//! - **Scanner**: declarations to nodes, C type resolution (`scanner` module)
//! - **Dump**: runtime type information from the probe (`dump` module)
//! - **Passes**: annotations, pairing and heuristics (`passes` module)
//! - **Validation**: introspectability checks (`introspectable` module)
//! - **GIR**: writer, reader and include loading (`gir` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use girscan_core::{load_units, Pipeline, ScanOptions};
//!
//! let unit = load_units(&["build/foo.json".into()])?;
//! let mut pipeline = Pipeline::new(ScanOptions::new("Foo", "1.0"));
//! let output = pipeline.run(&unit)?;
//! std::fs::write("Foo-1.0.gir", output.gir)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod annotation;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod dump;
pub mod error;
pub mod gir;
pub mod introspectable;
pub mod passes;
pub mod pipeline;
pub mod position;
pub mod scanner;
pub mod utils;

pub use config::{Config, ConfigError};
pub use diagnostic::{Diagnostic, Diagnostics, Severity, WarningCode, WarningConfig};
pub use error::{DumpError, GirError, NameError, ScanError};
pub use gir::{GirReader, GirWriter};
pub use pipeline::{doc_check, load_units, passthrough, Pipeline, ScanOptions, ScanOutput};
pub use position::SourcePosition;
pub use scanner::ScanUnit;
