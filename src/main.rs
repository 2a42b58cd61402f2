use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bftape::batch::run_batch;
use bftape::exec::execute;
use bftape::machine::{InputMode, Machine, MachineConfig};
use bftape::program::Program;
use bftape::tape::DEFAULT_CAPACITY;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bftape", about = "Run Brainfuck programs on a growable byte tape")]
struct Cli {
    /// Brainfuck source files. Several files run in parallel with empty input.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// How `,` reads input.
    #[arg(long, value_enum, default_value_t = InputMode::Raw)]
    input_mode: InputMode,

    /// Print a prompt on stderr before each line read (line mode only).
    #[arg(long)]
    prompt: bool,

    /// Initial number of tape cells.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Stop after this many executed ops.
    #[arg(long)]
    step_limit: Option<usize>,

    /// Run ops exactly as written, without loop rewriting.
    #[arg(long)]
    no_optimize: bool,

    /// Echo the source to stderr before running.
    #[arg(long)]
    show_source: bool,

    /// Print the op listing instead of running.
    #[arg(long)]
    disasm: bool,
}

/// Read and translate one source file.
fn load(path: &Path, show_source: bool) -> Result<Program, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    if show_source {
        eprintln!("Source code ({}):\n{source}", path.display());
    }
    Program::parse(&source).map_err(|e| format!("{}: {e}", path.display()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = MachineConfig {
        initial_capacity: cli.capacity,
        input_mode: cli.input_mode,
        prompt: cli.prompt,
        step_limit: cli.step_limit,
        optimize: !cli.no_optimize,
    };

    let mut programs = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match load(path, cli.show_source) {
            Ok(p) => programs.push(p),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }

    if cli.disasm {
        for (path, program) in cli.files.iter().zip(&programs) {
            let program = if config.optimize {
                program.optimize()
            } else {
                program.clone()
            };
            if cli.files.len() > 1 {
                println!("==> {} <==", path.display());
            }
            print!("{}", program.disassemble());
        }
        return;
    }

    if programs.len() == 1 {
        run_single(&programs[0], config);
    } else {
        run_many(&cli.files, &programs, &config);
    }
}

fn run_single(program: &Program, config: MachineConfig) {
    let program = if config.optimize {
        program.optimize()
    } else {
        program.clone()
    };
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    let mut machine = Machine::new(config, stdin, stdout);

    match execute(&program, &mut machine) {
        Ok(stats) if !stats.halted => {
            eprintln!("stopped after {} steps (step limit)", stats.steps);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn run_many(paths: &[PathBuf], programs: &[Program], config: &MachineConfig) {
    let results = run_batch(programs, config);
    let mut stdout = io::stdout().lock();
    let mut failed = false;

    for (path, result) in paths.iter().zip(results) {
        let written = match result {
            Ok(output) => write_section(&mut stdout, path, &output),
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                failed = true;
                writeln!(stdout, "==> {} <==", path.display())
            }
        };
        if let Err(e) = written.and_then(|()| stdout.flush()) {
            eprintln!("error writing output: {e}");
            std::process::exit(1);
        }
    }

    if failed {
        std::process::exit(1);
    }
}

/// Write one batch result under its `==> path <==` header.
fn write_section(out: &mut impl Write, path: &Path, output: &[u8]) -> io::Result<()> {
    writeln!(out, "==> {} <==", path.display())?;
    out.write_all(output)?;
    writeln!(out)
}
