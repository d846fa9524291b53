//! The scan pipeline, end to end
//!
//! Strictly sequential: dependencies are loaded, comments parsed, symbols
//! converted, the runtime dump merged, the semantic passes and the
//! introspectability checks run, and the namespace is written. Fatal
//! problems stop the run; everything else lands in [`Diagnostics`].

use crate::annotation::{CommentBlockParser, CommentBlocks};
use crate::ast::{Include, Model, Namespace};
use crate::config::{Config, ConfigError};
use crate::diagnostic::{Diagnostics, WarningConfig};
use crate::dump::{DumpMerger, DumpSource, IntrospectionBinary};
use crate::error::ScanError;
use crate::gir::{self, gir_search_path, load_include, GirReader, GirWriter};
use crate::introspectable::IntrospectabilityValidator;
use crate::passes::SemanticTransformer;
use crate::scanner::{ScanUnit, Transformer};
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything a scan needs besides its input
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Namespace name
    pub namespace: String,
    /// Namespace version
    pub version: String,
    /// C identifier prefixes; empty means the namespace name
    pub identifier_prefixes: Vec<String>,
    /// C symbol prefixes; empty means derived from the identifier prefixes
    pub symbol_prefixes: Vec<String>,
    /// Keep symbols without a known prefix
    pub accept_unprefixed: bool,
    /// Namespaces this one depends on
    pub includes: Vec<Include>,
    /// Extra directories for included GIR files
    pub include_paths: Vec<PathBuf>,
    /// Exported pkg-config packages
    pub packages: Vec<String>,
    /// Recorded C headers
    pub c_includes: Vec<String>,
    /// Shared libraries
    pub shared_libraries: Vec<String>,
    /// Documentation format name
    pub doc_format: Option<String>,
    /// Runtime type information; without it only static data is used
    pub dump: Option<DumpSource>,
    /// Roots stripped from source file names
    pub sources_top_dirs: Vec<PathBuf>,
    /// Run the write/read/write self-check
    pub reparse_validate: bool,
    /// Warning visibility
    pub warnings: WarningConfig,
}

impl ScanOptions {
    /// Options with defaults for everything but the namespace identity
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        ScanOptions {
            namespace: namespace.into(),
            version: version.into(),
            identifier_prefixes: Vec::new(),
            symbol_prefixes: Vec::new(),
            accept_unprefixed: false,
            includes: Vec::new(),
            include_paths: Vec::new(),
            packages: Vec::new(),
            c_includes: Vec::new(),
            shared_libraries: Vec::new(),
            doc_format: None,
            dump: None,
            sources_top_dirs: Vec::new(),
            reparse_validate: false,
            warnings: WarningConfig::default(),
        }
    }

    /// Options from a configuration file; name and version are required
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let namespace = config
            .namespace
            .name
            .clone()
            .ok_or_else(|| ConfigError::Invalid("[namespace] name is not set".to_string()))?;
        let version = config
            .namespace
            .version
            .clone()
            .ok_or_else(|| ConfigError::Invalid("[namespace] version is not set".to_string()))?;

        let scan = &config.scan;
        let dump = match (&scan.dump, scan.probe.is_empty()) {
            (Some(path), _) => Some(DumpSource::File(path.clone())),
            (None, false) => Some(DumpSource::Probe(IntrospectionBinary::new(scan.probe.clone()))),
            (None, true) => None,
        };
        Ok(ScanOptions {
            identifier_prefixes: config.namespace.identifier_prefixes.clone(),
            symbol_prefixes: config.namespace.symbol_prefixes.clone(),
            accept_unprefixed: config.namespace.accept_unprefixed,
            includes: config.includes()?,
            include_paths: scan.include_paths.clone(),
            packages: scan.packages.clone(),
            c_includes: scan.c_includes.clone(),
            shared_libraries: scan.shared_libraries.clone(),
            doc_format: scan.doc_format.clone(),
            dump,
            sources_top_dirs: scan.sources_top_dirs.clone(),
            warnings: config.warning_config()?,
            ..ScanOptions::new(namespace, version)
        })
    }

    fn namespace(&self) -> Namespace {
        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        let mut namespace = Namespace::new(
            self.namespace.clone(),
            self.version.clone(),
            non_empty(&self.identifier_prefixes),
            non_empty(&self.symbol_prefixes),
        );
        namespace.shared_libraries = self.shared_libraries.clone();
        namespace.c_includes = self.c_includes.clone();
        namespace.exported_packages = self.packages.clone();
        if let Some(format) = &self.doc_format {
            namespace.doc_format = format.clone();
        }
        namespace.includes.extend(self.includes.iter().cloned());
        namespace
    }
}

/// Result of a successful scan
#[derive(Debug)]
pub struct ScanOutput {
    /// The GIR document
    pub gir: String,
    /// The final model
    pub model: Model,
    /// Comment blocks no node claimed are still here
    pub blocks: CommentBlocks,
}

/// One scan run; diagnostics survive a failed run
pub struct Pipeline {
    options: ScanOptions,
    diagnostics: Diagnostics,
}

impl Pipeline {
    /// Create a pipeline
    pub fn new(options: ScanOptions) -> Self {
        let diagnostics = Diagnostics::new(options.warnings.clone());
        Pipeline {
            options,
            diagnostics,
        }
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Consume the pipeline, keeping its diagnostics
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Scan one (merged) unit
    pub fn run(&mut self, unit: &ScanUnit) -> Result<ScanOutput, ScanError> {
        let options = &self.options;
        let diagnostics = &mut self.diagnostics;
        info!(
            namespace = %options.namespace,
            version = %options.version,
            symbols = unit.symbols.len(),
            comments = unit.comments.len(),
            "scanning"
        );

        let mut model = Model::new(options.namespace());
        model.accept_unprefixed = options.accept_unprefixed;
        let search_path = gir_search_path(&options.include_paths);
        for include in &options.includes {
            load_include(&mut model, include, &search_path)?;
        }

        let mut blocks = CommentBlockParser::new(diagnostics).parse_comment_blocks(&unit.comments);
        Transformer::new(&mut model, diagnostics).parse(&unit.symbols)?;

        let mut merger = DumpMerger::new(&mut model, diagnostics);
        merger.init_parse()?;
        if let Some(source) = &options.dump {
            merger.merge(source)?;
        } else {
            debug!("no runtime dump; skipping type merge");
        }

        SemanticTransformer::new(&mut model, diagnostics, &mut blocks).transform()?;
        IntrospectabilityValidator::new(&mut model, diagnostics, &blocks).validate()?;

        let gir = if options.reparse_validate {
            gir::round_trip(&model, &options.sources_top_dirs)?
        } else {
            GirWriter::new(&model)
                .with_sources_roots(options.sources_top_dirs.clone())
                .write()?
        };

        if diagnostics.warnings_are_fatal() {
            return Err(ScanError::WarningsAsErrors {
                count: diagnostics.warning_count(),
            });
        }
        debug!(
            warnings = diagnostics.warning_count(),
            errors = diagnostics.error_count(),
            "scan finished"
        );
        Ok(ScanOutput { gir, model, blocks })
    }
}

/// Load and merge several scan units in order
pub fn load_units(paths: &[PathBuf]) -> Result<ScanUnit, ScanError> {
    let units = paths
        .iter()
        .map(|p| ScanUnit::load(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ScanUnit::merge(units))
}

/// Read a GIR document and write it back out
pub fn passthrough(text: &str) -> Result<String, ScanError> {
    let model = GirReader::new().read_model(text)?;
    Ok(GirWriter::new(&model).write()?)
}

/// Parse only the comments of a unit
pub fn doc_check(unit: &ScanUnit, diagnostics: &mut Diagnostics) -> CommentBlocks {
    CommentBlockParser::new(diagnostics).parse_comment_blocks(&unit.comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RawComment;
    use crate::scanner::{SourceType, Symbol, SymbolKind};

    fn unit() -> ScanUnit {
        let func = SourceType::function(SourceType::basic("int"), Vec::new());
        ScanUnit {
            symbols: vec![Symbol::new(SymbolKind::Function, "foo_answer")
                .with_type(func)
                .at("foo.h", 3)],
            comments: vec![RawComment {
                text: "/**\n * foo_answer:\n *\n * Returns: the answer\n */".to_string(),
                filename: "foo.c".to_string(),
                line: 10,
            }],
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::parse(
            "[namespace]\nname = \"Foo\"\nversion = \"1.0\"\n[scan]\ndump = \"/tmp/dump.xml\"\n",
        )
        .unwrap();
        let options = ScanOptions::from_config(&config).unwrap();
        assert_eq!(options.namespace, "Foo");
        assert!(matches!(options.dump, Some(DumpSource::File(_))));
    }

    #[test]
    fn test_options_need_a_namespace() {
        let config = Config::parse("[namespace]\nversion = \"1.0\"\n").unwrap();
        assert!(ScanOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_run_without_dump() {
        let mut pipeline = Pipeline::new(ScanOptions::new("Foo", "1.0"));
        let output = pipeline.run(&unit()).unwrap();
        assert!(output.gir.contains("<function name=\"answer\" c:identifier=\"foo_answer\">"));
        assert!(output
            .gir
            .contains("<doc xml:space=\"preserve\" filename=\"foo.c\" line=\"13\">the answer</doc>"));
    }

    #[test]
    fn test_reparse_validate_passes() {
        let mut options = ScanOptions::new("Foo", "1.0");
        options.reparse_validate = true;
        let output = Pipeline::new(options).run(&unit()).unwrap();
        assert!(output.gir.contains("<namespace name=\"Foo\""));
    }

    #[test]
    fn test_empty_unit_is_fatal() {
        let err = Pipeline::new(ScanOptions::new("Foo", "1.0"))
            .run(&ScanUnit::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::EmptyNamespace));
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let mut options = ScanOptions::new("Foo", "1.0");
        options.includes = vec![Include::new("DoesNotExist", "0.0")];
        options.include_paths = vec![PathBuf::from("/nonexistent")];
        let err = Pipeline::new(options).run(&unit()).unwrap_err();
        assert!(matches!(err, ScanError::IncludeNotFound(..)));
    }

    #[test]
    fn test_passthrough_is_stable() {
        let gir = Pipeline::new(ScanOptions::new("Foo", "1.0"))
            .run(&unit())
            .unwrap()
            .gir;
        assert_eq!(passthrough(&gir).unwrap(), gir);
    }
}
