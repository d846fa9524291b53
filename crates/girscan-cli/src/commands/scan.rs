//! `girscan scan`: run the pipeline and write the GIR document.
//!
//! Settings come from `girscan.toml` (the working directory's, or the one
//! given with `--config`); flags override it.

use crate::output::Reporter;
use anyhow::{bail, Context};
use clap::Args;
use girscan_core::config::CONFIG_FILE;
use girscan_core::dump::DumpSource;
use girscan_core::{load_units, Config, Pipeline, ScanOptions};
use std::path::PathBuf;

#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Scan units (JSON) produced by the front end
    pub units: Vec<PathBuf>,

    /// Configuration file (defaults to ./girscan.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Namespace name
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Namespace version
    #[arg(long)]
    pub nsversion: Option<String>,

    /// C identifier prefix (repeatable)
    #[arg(long = "identifier-prefix", value_name = "PREFIX")]
    pub identifier_prefixes: Vec<String>,

    /// C symbol prefix (repeatable)
    #[arg(long = "symbol-prefix", value_name = "PREFIX")]
    pub symbol_prefixes: Vec<String>,

    /// Keep symbols that match no prefix
    #[arg(long)]
    pub accept_unprefixed: bool,

    /// Dependency as Name-Version (repeatable)
    #[arg(short, long = "include", value_name = "NAME-VERSION")]
    pub includes: Vec<String>,

    /// Extra directory searched for included GIR files
    #[arg(long = "include-dir", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// pkg-config package to export
    #[arg(long = "pkg-export", value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// C header to record
    #[arg(long = "c-include", value_name = "HEADER")]
    pub c_includes: Vec<String>,

    /// Shared library holding the symbols
    #[arg(short, long = "library", value_name = "LIBRARY")]
    pub libraries: Vec<String>,

    /// Documentation format recorded in the output
    #[arg(long)]
    pub doc_format: Option<String>,

    /// Precomputed runtime type dump
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,

    /// Introspection probe program
    #[arg(long, value_name = "PROGRAM")]
    pub probe: Option<String>,

    /// Wrapper used to run the probe (repeatable, in order)
    #[arg(long = "launcher", value_name = "ARG")]
    pub launcher: Vec<String>,

    /// Keep the probe's scratch directory
    #[arg(long)]
    pub keep_temps: bool,

    /// Root stripped from source file names
    #[arg(long = "sources-top-dir", value_name = "DIR")]
    pub sources_top_dirs: Vec<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Re-read the written GIR and require an identical second write
    #[arg(long)]
    pub reparse_validate: bool,

    /// Show regular warnings
    #[arg(long)]
    pub warn_all: bool,

    /// Show pedantic warnings
    #[arg(long)]
    pub strict: bool,

    /// Fail the run on any warning
    #[arg(long)]
    pub warn_error: bool,

    /// Warning name or code to silence (repeatable)
    #[arg(long, value_name = "WARNING")]
    pub disable: Vec<String>,
}

impl ScanArgs {
    fn load_config(&self) -> anyhow::Result<Config> {
        let config = match &self.config {
            Some(path) => Some(Config::from_file(path)?),
            None => {
                let cwd = std::env::current_dir().context("failed to read working directory")?;
                Config::discover(&cwd)?
            }
        };
        if config.is_some() {
            tracing::debug!(file = CONFIG_FILE, "loaded configuration");
        }
        Ok(config.unwrap_or_default())
    }

    /// Layer the flags over the file's settings
    fn apply(&self, config: &mut Config) {
        let ns = &mut config.namespace;
        if let Some(name) = &self.namespace {
            ns.name = Some(name.clone());
        }
        if let Some(version) = &self.nsversion {
            ns.version = Some(version.clone());
        }
        replace_if_given(&mut ns.identifier_prefixes, &self.identifier_prefixes);
        replace_if_given(&mut ns.symbol_prefixes, &self.symbol_prefixes);
        ns.accept_unprefixed |= self.accept_unprefixed;

        let scan = &mut config.scan;
        replace_if_given(&mut scan.units, &self.units);
        scan.includes.extend(self.includes.iter().cloned());
        scan.include_paths.extend(self.include_dirs.iter().cloned());
        scan.packages.extend(self.packages.iter().cloned());
        scan.c_includes.extend(self.c_includes.iter().cloned());
        scan.shared_libraries.extend(self.libraries.iter().cloned());
        replace_if_given(&mut scan.sources_top_dirs, &self.sources_top_dirs);
        if let Some(format) = &self.doc_format {
            scan.doc_format = Some(format.clone());
        }
        match (&self.dump, &self.probe) {
            (Some(dump), _) => scan.dump = Some(dump.clone()),
            (None, Some(probe)) => {
                scan.dump = None;
                scan.probe = vec![probe.clone()];
            }
            (None, None) => {}
        }
        if let Some(output) = &self.output {
            scan.output = Some(output.clone());
        }

        let warnings = &mut config.warnings;
        warnings.warn_all |= self.warn_all;
        warnings.strict |= self.strict;
        warnings.warn_error |= self.warn_error;
        warnings.disabled.extend(self.disable.iter().cloned());
    }

    /// Final options; the merged configuration must name a namespace
    pub fn options(&self) -> anyhow::Result<(ScanOptions, Config)> {
        let mut config = self.load_config()?;
        self.apply(&mut config);
        config.validate()?;

        let mut options =
            ScanOptions::from_config(&config).context("use --namespace and --nsversion")?;
        options.reparse_validate = self.reparse_validate;
        if let Some(DumpSource::Probe(binary)) = &mut options.dump {
            binary.launcher = self.launcher.clone();
            binary.keep_temps = self.keep_temps;
        }
        Ok((options, config))
    }
}

fn replace_if_given<T: Clone>(target: &mut Vec<T>, given: &[T]) {
    if !given.is_empty() {
        *target = given.to_vec();
    }
}

pub fn execute(args: ScanArgs, reporter: &Reporter) -> anyhow::Result<()> {
    let (options, config) = args.options()?;
    if config.scan.units.is_empty() {
        bail!("no scan units given");
    }
    let namespace = format!("{}-{}", options.namespace, options.version);
    let unit = load_units(&config.scan.units)?;

    let mut pipeline = Pipeline::new(options);
    let result = pipeline.run(&unit);
    reporter.report(pipeline.diagnostics())?;
    let output = result.with_context(|| format!("scan of {} failed", namespace))?;

    super::write_output(config.scan.output.as_deref(), &output.gir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use girscan_core::WarningCode;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ScanArgs,
    }

    fn parse(argv: &[&str]) -> ScanArgs {
        let mut full = vec!["girscan"];
        full.extend_from_slice(argv);
        Wrapper::parse_from(full).args
    }

    #[test]
    fn test_flags_without_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        std::fs::write(&config_path, "").unwrap();

        let args = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "-n",
            "Foo",
            "--nsversion",
            "1.0",
            "-i",
            "GObject-2.0",
            "--disable",
            "missing-colon",
            "foo.json",
        ]);
        let (options, config) = args.options().unwrap();
        assert_eq!(options.namespace, "Foo");
        assert_eq!(options.includes.len(), 1);
        assert!(options.warnings.disabled.contains(&WarningCode::MissingColon));
        assert_eq!(config.scan.units, vec![PathBuf::from("foo.json")]);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &config_path,
            "[namespace]\nname = \"Foo\"\nversion = \"1.0\"\n[scan]\ndump = \"dump.xml\"\nincludes = [\"GLib-2.0\"]\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "--nsversion",
            "2.0",
            "--probe",
            "./foo-probe",
            "--launcher",
            "qemu-arm",
            "-i",
            "GObject-2.0",
        ]);
        let (options, _) = args.options().unwrap();
        assert_eq!(options.version, "2.0");
        assert_eq!(options.includes.len(), 2);
        match options.dump {
            Some(DumpSource::Probe(binary)) => {
                assert_eq!(binary.args, vec!["./foo-probe"]);
                assert_eq!(binary.launcher, vec!["qemu-arm"]);
            }
            other => panic!("expected probe, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_namespace() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        std::fs::write(&config_path, "").unwrap();
        let args = parse(&["--config", config_path.to_str().unwrap(), "--nsversion", "1.0"]);
        assert!(args.options().is_err());
    }
}
