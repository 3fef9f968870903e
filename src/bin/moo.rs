//! `moo`: pack, unpack, compile, decompile and check `.moo` sources.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use smol_str::SmolStr;

use moosrc::MooError;
use moosrc::hir::{
    Diagnostic, ExportTable, ExportTarget, ModuleInterface, Version, lint, resolve,
};
use moosrc::image::{CompileOptions, DbImage, DecompileMode, compile, decompile};
use moosrc::project::{self, FlatLayout, FsLoader, Packer, SourceDb, unpack};
use moosrc::syntax::{CompilationUnit, unparse};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand includes into a single file
    Pack {
        root: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Split a unit into one file per object
    Unpack {
        root: PathBuf,
        #[arg(long)]
        dir: PathBuf,
    },
    /// Resolve a unit and write its database image
    ///
    /// Modules named in `requires` must be described with `--export`.
    Compile {
        root: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Lowest number given to `@name` objects
        #[arg(long, default_value_t = 0)]
        first_object: i64,
        /// `$name=N` binding used when #0 does not define `name`
        #[arg(long = "system", value_parser = parse_binding)]
        system: Vec<(SmolStr, i64)>,
        /// `MODULE[@VERSION]::NAME=N`: an object another module exports
        #[arg(long = "export", value_parser = parse_export)]
        exports: Vec<ExportBinding>,
    },
    /// Turn a database image back into source
    Decompile(DecompileArgs),
    /// Resolve every `module.moo` and `database.moo` below a directory
    Check { dir: PathBuf },
}

#[derive(Args, Debug)]
struct DecompileArgs {
    image: PathBuf,
    /// Emit a module with this name and `@name` objects
    #[arg(long, conflicts_with = "database", required_unless_present = "database")]
    module: Option<String>,
    #[arg(long, requires = "module")]
    version: Option<String>,
    /// Emit a database with `#n` objects
    #[arg(long)]
    database: bool,
    /// Write an unpacked tree into this directory instead of one file
    #[arg(long, conflicts_with = "output")]
    unpack: Option<PathBuf>,
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_binding(text: &str) -> Result<(SmolStr, i64), String> {
    let (name, number) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=NUMBER, got `{text}`"))?;
    let number = number
        .trim()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| format!("invalid object number in `{text}`"))?;
    Ok((name.trim().trim_start_matches('$').into(), number))
}

#[derive(Clone, Debug, PartialEq)]
struct ExportBinding {
    module: SmolStr,
    version: Option<Version>,
    name: SmolStr,
    number: i64,
}

fn parse_export(text: &str) -> Result<ExportBinding, String> {
    let (path, number) = text
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE::NAME=NUMBER, got `{text}`"))?;
    let (module, name) = path
        .trim()
        .split_once("::")
        .ok_or_else(|| format!("expected MODULE::NAME before `=` in `{text}`"))?;
    let (module, version) = match module.split_once('@') {
        Some((module, version)) => (module, Some(version.parse()?)),
        None => (module, None),
    };
    let number = number
        .trim()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| format!("invalid object number in `{text}`"))?;
    Ok(ExportBinding {
        module: module.into(),
        version,
        name: name.into(),
        number,
    })
}

/// Group `--export` bindings into one interface per module.
fn export_table(bindings: Vec<ExportBinding>) -> anyhow::Result<ExportTable> {
    let mut modules: IndexMap<SmolStr, ModuleInterface> = IndexMap::new();
    for binding in bindings {
        let interface = modules
            .entry(binding.module.clone())
            .or_insert_with(|| ModuleInterface::new(binding.module.clone(), None));
        match (interface.version, binding.version) {
            (Some(a), Some(b)) if a != b => {
                bail!("conflicting versions given for module `{}`", binding.module)
            }
            (None, Some(v)) => interface.version = Some(v),
            _ => {}
        }
        interface
            .exports
            .insert(binding.name, ExportTarget::Object(binding.number));
    }
    Ok(modules.into_values().collect())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("moosrc=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Pack { root, output } => {
            let sources = SourceDb::new();
            let unit = pack(&root, &sources)?;
            emit(output.as_deref(), &unparse(&unit))?;
        }
        Command::Unpack { root, dir } => {
            let sources = SourceDb::new();
            let unit = pack(&root, &sources)?;
            unpack(&unit, &FlatLayout::default()).write_to(&dir)?;
        }
        Command::Compile {
            root,
            output,
            first_object,
            system,
            exports,
        } => {
            let exports = export_table(exports)?;
            let sources = SourceDb::new();
            let unit = pack(&root, &sources)?;
            for warning in lint(&unit) {
                eprintln!("{}", sources.render(&warning));
            }
            let resolved = resolve(unit, &exports).map_err(|e| report(&sources, &e))?;
            let options = CompileOptions {
                first_object,
                system_objects: system.into_iter().collect::<IndexMap<_, _>>(),
                ..CompileOptions::default()
            };
            let compiled = compile(&resolved, &options).map_err(|e| report(&sources, &e))?;
            let bytes = compiled.image.to_bytes()?;
            match output {
                Some(path) => std::fs::write(&path, bytes)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        Command::Decompile(args) => decompile_command(args)?,
        Command::Check { dir } => return check(&dir),
    }
    Ok(ExitCode::SUCCESS)
}

fn pack(root: &Path, sources: &SourceDb) -> anyhow::Result<CompilationUnit> {
    Packer::new(&FsLoader, sources)
        .pack(root)
        .map_err(|e| report(sources, &e))
}

fn decompile_command(args: DecompileArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("reading {}", args.image.display()))?;
    let image = DbImage::from_bytes(&bytes)?;
    let mode = match args.module {
        Some(name) => DecompileMode::Module {
            name: name.into(),
            version: args.version.map(Into::into),
        },
        None if args.database => DecompileMode::Database,
        None => bail!("one of --module or --database is required"),
    };
    let unit = decompile(&image, &mode)?;
    match args.unpack {
        Some(dir) => unpack(&unit, &FlatLayout::default()).write_to(&dir)?,
        None => emit(args.output.as_deref(), &unparse(&unit))?,
    }
    Ok(())
}

fn check(dir: &Path) -> anyhow::Result<ExitCode> {
    let roots = project::discover(dir)?;
    if roots.is_empty() {
        bail!("no module.moo or database.moo below {}", dir.display());
    }
    let sources = SourceDb::new();
    let report = project::check(&roots, &FsLoader, &sources, &[]);
    for diagnostic in report.diagnostics.diagnostics() {
        eprintln!("{}", sources.render(diagnostic));
    }
    eprintln!(
        "{} unit(s) checked: {} error(s), {} warning(s)",
        roots.len(),
        report.diagnostics.error_count(),
        report.diagnostics.warning_count()
    );
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn emit(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn report(sources: &SourceDb, err: &MooError) -> anyhow::Error {
    anyhow!(sources.render(&Diagnostic::from(err)))
}
