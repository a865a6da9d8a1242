//! CLI entry point for the fantasy console runner.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use color_eyre::eyre::{eyre, Result, WrapErr};
use console_core::{
    disassemble_range, dump_address_space, BinaryProgram, BreakpointHost, InstructionSet, Machine,
    MachineBuilder, MachineConfig, DEFAULT_MEMORY_SIZE,
};
use log::LevelFilter;
use simple_logger::SimpleLogger;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: fconsole <program> [options]

Options:
  -m, --memory <bytes>        Memory size, decimal or 0x-prefixed hex (default 0xFFFF)
  -d, --debug                 Print the memory layout and trace every instruction
  -s, --step                  Wait for Enter after every instruction
  -i, --instructions <file>   Instruction table (tag,opcode,type,mnemonic)
      --dump-start <file>     Write a hex dump of memory after boot
      --dump-end <file>       Write a hex dump of memory after the program halts
  -l, --list <count>          Print the first <count> program instructions after boot
  -h, --help                  Show this help message

Examples:
  fconsole game.bin
  fconsole game.bin -m 0x4000 --debug --dump-end memory.txt
";

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    program: PathBuf,
    memory_size: u32,
    debug: bool,
    step: bool,
    instructions: Option<PathBuf>,
    dump_start: Option<PathBuf>,
    dump_end: Option<PathBuf>,
    list: Option<usize>,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut program: Option<PathBuf> = None;
    let mut memory_size = DEFAULT_MEMORY_SIZE;
    let mut debug = false;
    let mut step = false;
    let mut instructions = None;
    let mut dump_start = None;
    let mut dump_end = None;
    let mut list = None;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "-d" | "--debug" => debug = true,
            "-s" | "--step" => step = true,
            "-m" | "--memory" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                memory_size = parse_size(&value.to_string_lossy())?;
            }
            "-i" | "--instructions" => instructions = Some(path_value(&mut args, &flag)?),
            "--dump-start" => dump_start = Some(path_value(&mut args, &flag)?),
            "--dump-end" => dump_end = Some(path_value(&mut args, &flag)?),
            "-l" | "--list" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                let text = value.to_string_lossy();
                list = Some(
                    text.parse::<usize>()
                        .map_err(|_| format!("invalid instruction count: {text}"))?,
                );
            }
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if program.is_some() {
                    return Err("multiple program paths provided".to_string());
                }
                program = Some(PathBuf::from(arg));
            }
        }
    }

    let program = program.ok_or_else(|| "missing program path".to_string())?;
    Ok(ParseResult::Run(RunArgs {
        program,
        memory_size,
        debug,
        step,
        instructions,
        dump_start,
        dump_end,
        list,
    }))
}

fn path_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<PathBuf, String> {
    args.next()
        .map(PathBuf::from)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_size(text: &str) -> Result<u32, String> {
    let parsed = text.strip_prefix("0x").map_or_else(
        || text.parse::<u32>(),
        |hex| u32::from_str_radix(hex, 16),
    );
    match parsed {
        Ok(size) if size <= 0x10000 => Ok(size),
        Ok(size) => Err(format!("memory size {size:#x} exceeds 0x10000")),
        Err(_) => Err(format!("invalid memory size: {text}")),
    }
}

/// Pauses on stdin until a line is entered.
struct StdinBreakpoints;

impl BreakpointHost for StdinBreakpoints {
    fn wait_for_resume(&mut self, ip: u16) {
        eprint!("paused at {ip:#06x}, press Enter to continue ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
    }
}

fn write_dump(machine: &Machine, memory_size: u32, path: &Path) -> Result<()> {
    let dump = dump_address_space(machine.cpu().memory(), memory_size);
    fs::write(path, dump).wrap_err_with(|| format!("failed to write dump {}", path.display()))
}

fn print_listing(machine: &Machine, count: usize) {
    let cpu = machine.cpu();
    for row in disassemble_range(cpu.memory(), cpu.instructions(), cpu.ip(), count) {
        println!("{:#06x}: {row}", row.address);
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let image = fs::read(&args.program)
        .wrap_err_with(|| format!("failed to read program {}", args.program.display()))?;

    let mut builder = MachineBuilder::new().breakpoint_host(Box::new(StdinBreakpoints));
    if let Some(path) = &args.instructions {
        let table = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read instruction table {}", path.display()))?;
        let set = InstructionSet::parse(&table)
            .wrap_err_with(|| format!("invalid instruction table {}", path.display()))?;
        builder = builder.instructions(Rc::new(set));
    }

    let config = MachineConfig {
        memory_size: args.memory_size,
        debug: args.debug,
        step_through: args.step,
        ..MachineConfig::default()
    };
    let mut machine = Machine::boot_with(
        &config,
        Box::new(BinaryProgram::new(image)),
        Vec::new(),
        builder,
    )
    .wrap_err("failed to boot the machine")?;

    if let Some(path) = &args.dump_start {
        write_dump(&machine, args.memory_size, path)?;
    }
    if let Some(count) = args.list {
        print_listing(&machine, count);
    }

    let outcome = machine.run();

    if let Some(path) = &args.dump_end {
        write_dump(&machine, args.memory_size, path)?;
    }

    match outcome {
        Ok(retired) => {
            println!("halted after {retired} instructions");
            Ok(())
        }
        Err(fault) => {
            eprintln!("{}", machine.cpu().register_dump());
            Err(fault).wrap_err("program faulted")
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            return Ok(());
        }
        Ok(ParseResult::Run(args)) => args,
        Err(error) => {
            eprintln!("{USAGE_TEXT}");
            return Err(eyre!(error));
        }
    };

    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .wrap_err("failed to initialise logging")?;

    run(&args)
}
