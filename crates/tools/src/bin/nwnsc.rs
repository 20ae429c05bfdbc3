//!
//! Compile NWScript sources to NCS bytecode, or disassemble NCS files.
//!
//! Usage: `nwnsc [options] <file>...`

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

use nwscript_compiler::{Compiler, CompilerOptions, FileSystemLoader};

#[derive(Parser, Debug)]
#[command(name = "nwnsc")]
#[command(about = "NWScript compiler and disassembler")]
struct Args {
    /// Script files to compile (`.nss`) or disassemble (`.ncs`)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Disassemble compiled scripts instead of compiling
    #[arg(short = 'd', long)]
    disassemble: bool,

    /// Directory for batch output artifacts
    #[arg(short = 'b', long = "batch-dir")]
    batch_dir: Option<PathBuf>,

    /// Include search paths, separated by ';' (repeatable)
    #[arg(short = 'i', long = "include", value_delimiter = ';')]
    include: Vec<PathBuf>,

    /// Game installation directory holding the base scripts
    #[arg(long = "install-dir")]
    install_dir: Option<PathBuf>,

    /// Per-user override directory
    #[arg(long = "home-dir")]
    home_dir: Option<PathBuf>,

    /// Reference compiler version to match (169 or 174)
    #[arg(short = 'm', long = "compiler-version", default_value_t = 174)]
    version: u32,

    /// Enable the optimizer
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Enable the extension language features
    #[arg(short = 'e', long)]
    extensions: bool,

    /// Emit `.ndb` debug symbols
    #[arg(short = 'g', long = "debug-symbols")]
    debug_symbols: bool,

    /// Suppress per-file status output
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Keep compiling remaining files after a failure
    #[arg(short = 'y', long = "continue-on-error")]
    continue_on_error: bool,

    /// Prefix prepended to every diagnostic line
    #[arg(short = 'x', long = "error-prefix")]
    error_prefix: Option<String>,

    /// Explicit output file (single input only)
    #[arg(short = 'r', long = "output")]
    output: Option<PathBuf>,
}

fn main() {
    nwscript_tools::init_logging();
    let args = Args::parse();

    if args.output.is_some() && args.files.len() > 1 {
        error!("--output requires a single input file");
        process::exit(1);
    }

    let mut loader = FileSystemLoader::new();
    loader.add_path(".");
    for dir in &args.include {
        loader.add_path(dir.clone());
    }
    for dir in [&args.home_dir, &args.install_dir].into_iter().flatten() {
        loader.add_path(dir.clone());
    }
    // Sources next to the input files are includable too.
    for file in &args.files {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            loader.add_path(parent.to_path_buf());
        }
    }

    let options = CompilerOptions {
        version: args.version,
        optimize: args.optimize,
        extensions: args.extensions,
        debug_symbols: args.debug_symbols,
        max_errors: 1,
    };
    let mut compiler = Compiler::new(Box::new(loader), options);
    compiler.set_error_prefix(args.error_prefix.clone());

    let mut failures = 0usize;
    for file in &args.files {
        let ok = if args.disassemble {
            disassemble_file(&mut compiler, file, &args)
        } else {
            compile_file(&mut compiler, file, &args)
        };
        if !ok {
            failures += 1;
            if !args.continue_on_error {
                break;
            }
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}

fn compile_file(compiler: &mut Compiler, file: &Path, args: &Args) -> bool {
    let Some(name) = file.file_stem().and_then(|s| s.to_str()) else {
        error!("{}: not a usable script name", file.display());
        return false;
    };
    let source = match fs::read(file) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("{}: {}", file.display(), err);
            return false;
        }
    };

    let output = compiler.compile(name, &source);
    if !output.succeeded() {
        eprint!("{}", output.format_diagnostics(compiler.error_prefix()));
        return false;
    }

    let ncs_path = artifact_path(file, args, "ncs");
    if let Err(err) = write_artifact(&ncs_path, &output.code) {
        error!("{}: {}", ncs_path.display(), err);
        return false;
    }
    if let Some(debug) = &output.debug {
        let ndb_path = artifact_path(file, args, "ndb");
        if let Err(err) = write_artifact(&ndb_path, debug.as_bytes()) {
            error!("{}: {}", ndb_path.display(), err);
            return false;
        }
    }
    if !args.quiet {
        info!(
            "{} -> {} ({} bytes)",
            file.display(),
            ncs_path.display(),
            output.code.len()
        );
    }
    true
}

fn disassemble_file(compiler: &mut Compiler, file: &Path, args: &Args) -> bool {
    let code = match fs::read(file) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("{}: {}", file.display(), err);
            return false;
        }
    };
    let ndb_text = fs::read_to_string(file.with_extension("ndb")).ok();

    match compiler.disassemble(&code, ndb_text.as_deref()) {
        Ok(listing) => {
            let out_path = artifact_path(file, args, "pcode");
            if let Err(err) = write_artifact(&out_path, listing.as_bytes()) {
                error!("{}: {}", out_path.display(), err);
                return false;
            }
            if !args.quiet {
                info!("{} -> {}", file.display(), out_path.display());
            }
            true
        }
        Err(diag) => {
            error!("{}: {}", file.display(), diag);
            false
        }
    }
}

/// Output path for an artifact: explicit `--output`, the batch directory,
/// or next to the input.
fn artifact_path(input: &Path, args: &Args, extension: &str) -> PathBuf {
    if let Some(output) = &args.output {
        if extension == "ndb" {
            return output.with_extension("ndb");
        }
        return output.clone();
    }
    let mut path = input.with_extension(extension);
    if let Some(batch_dir) = &args.batch_dir {
        if let Some(file_name) = path.file_name() {
            path = batch_dir.join(file_name);
        }
    }
    path
}

fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}
