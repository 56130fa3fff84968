// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `ilc`: command-line driver for Viper IL.
//!
//! Parses an IL module, optionally optimizes it, and then runs, prints, or verifies it.

use std::ffi::OsString;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use viper_il::transform::{OptLevel, PassManager, PassRegistry};
use viper_il::{Diagnostics, Module};
use viper_vm::{
    DispatchKind, InstrSite, Program, RuntimeRegistry, Slot, TraceMask, TraceSink, Vm, VmConfig,
};

#[derive(Parser, Debug)]
#[command(name = "ilc", version, about = "Viper IL driver")]
struct Cli {
    /// Run `@main` of FILE (same as the `run` subcommand).
    #[arg(long, value_name = "FILE")]
    run: Option<PathBuf>,

    /// Optimization level: 0, 1, or 2 (`-O0`, `-O1`, `-O2`).
    #[arg(short = 'O', default_value = "0", value_parser = parse_level, global = true)]
    opt: OptLevel,

    /// VM dispatch strategy.
    #[arg(long, default_value = "switch", value_parser = parse_dispatch, global = true)]
    dispatch: DispatchKind,

    /// Trap after this many executed instructions.
    #[arg(long, value_name = "N", global = true)]
    max_steps: Option<u64>,

    /// Check operand kinds before every instruction.
    #[arg(long, global = true)]
    verify_operands: bool,

    /// Execute tail calls as ordinary calls.
    #[arg(long, global = true)]
    no_tail_calls: bool,

    /// Print every executed instruction to stderr.
    #[arg(long, global = true)]
    trace: bool,

    /// Log level.
    #[arg(
        long,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"],
        global = true
    )]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute `@main`.
    Run {
        /// IL source file.
        file: PathBuf,
        /// Entry function.
        #[arg(long, default_value = "main")]
        entry: String,
    },
    /// Optimize a module and print it.
    IlOpt {
        /// IL source file.
        file: PathBuf,
        /// Comma-separated pass names; overrides `-O`.
        #[arg(long, value_delimiter = ',')]
        passes: Vec<String>,
        /// Output path; stdout when absent.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse and verify a module.
    Verify {
        /// IL source file.
        file: PathBuf,
    },
    /// Native code generation.
    Codegen {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn parse_level(s: &str) -> Result<OptLevel, String> {
    OptLevel::parse(s).ok_or_else(|| format!("unknown optimization level '{s}'"))
}

fn parse_dispatch(s: &str) -> Result<DispatchKind, String> {
    DispatchKind::parse(s).ok_or_else(|| format!("unknown dispatch strategy '{s}'"))
}

/// Rewrites legacy single-dash long flags (`-run`) into their `--` form.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|a| if a == "-run" { OsString::from("--run") } else { a })
        .collect()
}

/// Maps `@main`'s result to a process exit status: the low byte of an integer result.
fn exit_status(result: Option<Slot>) -> u8 {
    match result {
        Some(Slot::I64(v)) => u8::try_from(v & 0xff).unwrap_or(u8::MAX),
        _ => 0,
    }
}

/// Prints `[trace] @fn:block#ip op` for every instruction.
#[derive(Debug, Default)]
struct StderrTrace;

impl TraceSink for StderrTrace {
    fn mask(&self) -> TraceMask {
        TraceMask::INSTR
    }

    fn instr(&mut self, program: &Program, site: InstrSite) {
        let func = program.function(site.func);
        let name = func.map_or("?", |f| &*f.name);
        let block = func
            .and_then(|f| f.blocks.get(site.block as usize))
            .map_or("?", |b| &*b.label);
        eprintln!("[trace] @{name}:{block}#{} {}", site.ip, site.op.mnemonic());
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_module(path: &Path) -> Result<Module> {
    let src =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let module = viper_il::text::parse_module(&src)
        .with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        functions = module.functions.len(),
        "module parsed"
    );
    Ok(module)
}

fn optimize(module: &mut Module, mut pm: PassManager) -> Result<()> {
    if pm.is_empty() {
        return Ok(());
    }
    pm.verify_between_passes(true)
        .set_resolver(Box::new(RuntimeRegistry::with_defaults()));
    let mut diags = Diagnostics::new();
    let ok = pm.run(module, &mut diags);
    let mut report = String::new();
    diags.flush(&mut report, None)?;
    eprint!("{report}");
    if !ok {
        bail!("optimization pipeline failed");
    }
    Ok(())
}

fn vm_config(cli: &Cli) -> VmConfig {
    let mut config = VmConfig::new().with_dispatch(cli.dispatch);
    config.max_steps = cli.max_steps;
    config.verify_operands = cli.verify_operands;
    config.tail_calls = !cli.no_tail_calls;
    config
}

fn run(cli: &Cli, path: &Path, entry: &str) -> Result<ExitCode> {
    let mut module = read_module(path)?;
    optimize(&mut module, PassManager::for_level(cli.opt))?;
    let program = Program::load(&module, &RuntimeRegistry::with_defaults())
        .with_context(|| format!("loading {}", path.display()))?;

    let mut vm = Vm::new(vm_config(cli));
    let mut tracer = StderrTrace;
    let sink: Option<&mut dyn TraceSink> = if cli.trace { Some(&mut tracer) } else { None };
    let result = vm.run_traced(&program, entry, &[], sink);

    let out = vm.take_output();
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    stdout.flush()?;

    match result {
        Ok(value) => Ok(ExitCode::from(exit_status(value))),
        Err(trap) => {
            eprintln!("{trap}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn il_opt(cli: &Cli, path: &Path, passes: &[String], output: Option<&Path>) -> Result<ExitCode> {
    let mut module = read_module(path)?;
    let pm = if passes.is_empty() {
        PassManager::for_level(cli.opt)
    } else {
        let mut pm = PassManager::new();
        for name in passes {
            let Some(pass) = PassRegistry::create(name) else {
                bail!("unknown pass '{name}'");
            };
            pm.add(pass);
        }
        pm
    };
    optimize(&mut module, pm)?;
    let text = viper_il::text::print_module(&module);
    match output {
        Some(out) => fs::write(out, text).with_context(|| format!("writing {}", out.display()))?,
        None => print!("{text}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn verify(path: &Path) -> Result<ExitCode> {
    let module = read_module(path)?;
    let errors = viper_il::verify::collect_errors(&module, &RuntimeRegistry::with_defaults());
    if errors.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    for e in &errors {
        eprintln!("error: {e}");
    }
    Ok(ExitCode::FAILURE)
}

fn dispatch(cli: &Cli) -> Result<ExitCode> {
    if let Some(path) = &cli.run {
        return run(cli, path, "main");
    }
    match &cli.command {
        Some(Command::Run { file, entry }) => run(cli, file, entry),
        Some(Command::IlOpt {
            file,
            passes,
            output,
        }) => il_opt(cli, file, passes, output.as_deref()),
        Some(Command::Verify { file }) => verify(file),
        Some(Command::Codegen { .. }) => bail!("codegen is not supported by this toolchain"),
        None => bail!("nothing to do; pass --run FILE or a subcommand (see --help)"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(&cli.log_level);
    match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().map(OsString::from))).unwrap()
    }

    #[test]
    fn legacy_run_flag_is_normalized() {
        let cli = parse(&["ilc", "-run", "prog.il", "-O2"]);
        assert_eq!(cli.run.as_deref(), Some(Path::new("prog.il")));
        assert_eq!(cli.opt, OptLevel::O2);
        assert!(cli.command.is_none(), "no subcommand expected");
    }

    #[test]
    fn vm_flags_reach_the_config() {
        let cli = parse(&[
            "ilc",
            "run",
            "prog.il",
            "--dispatch",
            "threaded",
            "--max-steps",
            "10",
            "--no-tail-calls",
        ]);
        let config = vm_config(&cli);
        assert_eq!(config.dispatch, DispatchKind::Threaded);
        assert_eq!(config.max_steps, Some(10));
        assert!(!config.tail_calls, "--no-tail-calls disables tail calls");
    }

    #[test]
    fn unknown_level_is_rejected() {
        let args = normalize_args(["ilc", "-O7", "verify", "x.il"].map(OsString::from));
        assert!(Cli::try_parse_from(args).is_err(), "-O7 must not parse");
    }

    #[test]
    fn exit_status_is_the_low_byte() {
        assert_eq!(exit_status(Some(Slot::I64(0x107))), 7);
        assert_eq!(exit_status(Some(Slot::I64(-1))), 255);
        assert_eq!(exit_status(None), 0);
    }
}
