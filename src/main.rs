//! Von Neumann Simulator - CLI Entry Point
//!
//! Commands:
//! - `vonneumann-sim run <program>` - Run an image or ASM file
//! - `vonneumann-sim debug <program>` - Interactive debugger
//! - `vonneumann-sim asm <source>` - Assemble to an image
//! - `vonneumann-sim disasm <image>` - Disassemble an image

use clap::{Args, Parser, Subcommand};
use vonneumann::cpu::{HaltReason, Observer, Phase};
use vonneumann::{MachineConfig, RunOutcome};

#[derive(Parser)]
#[command(name = "vonneumann-sim")]
#[command(version)]
#[command(about = "A micro-stepped simulator of a simple stored-program computer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the image or ASM file to execute
        program: String,
        /// Print every micro-step
        #[arg(short, long)]
        trace: bool,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Interactive debugger
    Debug {
        /// Path to the image or ASM file to debug
        program: String,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file (.json or text)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,
    /// Number of memory cells
    #[arg(short, long)]
    memory_size: Option<usize>,
    /// Micro-step limit for unattended runs
    #[arg(long)]
    max_steps: Option<u64>,
}

impl MachineArgs {
    fn resolve(&self) -> MachineConfig {
        let mut config = match &self.config {
            Some(path) => match MachineConfig::load(path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Failed to load config {}: {}", path, e);
                    std::process::exit(1);
                }
            },
            None => MachineConfig::default(),
        };
        if let Some(size) = self.memory_size {
            config.memory_size = size;
        }
        if let Some(steps) = self.max_steps {
            config.max_steps = steps;
        }
        if let Err(e) = config.validate() {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        config
    }
}

/// Prints trace lines and phase changes to stdout.
struct PrintObserver;

impl Observer for PrintObserver {
    fn phase_changed(&mut self, phase: Phase) {
        println!("  -- {} --", phase);
    }

    fn trace(&mut self, line: &str) {
        println!("{}", line);
    }

    fn halted(&mut self, reason: HaltReason) {
        println!("  == halted: {:?} ==", reason);
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { program, trace, machine } => {
            run_program(&program, trace, &machine.resolve());
        }
        Commands::Debug { program, machine } => {
            debug_program(&program, &machine.resolve());
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { image } => {
            disassemble_file(&image);
        }
    }
}

/// Load a program: `.asm` files are assembled, anything else is read as an image.
fn load_program(path: &str) -> Vec<i32> {
    use vonneumann::{assemble, load_image};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("Loaded {} words", image.len());
                image.words
            }
            Err(e) => {
                eprintln!("Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, trace: bool, config: &MachineConfig) {
    use vonneumann::{Machine, MachineError};

    println!("Running: {}", path);
    let words = load_program(path);

    let observer: Box<dyn Observer> = if trace {
        Box::new(PrintObserver)
    } else {
        Box::new(vonneumann::cpu::LogObserver)
    };

    let result = Machine::from_config(config, observer).and_then(|mut machine| {
        machine.load_memory(&words)?;
        println!();
        println!("--- Execution ---");
        let mut outcome = machine.run(config.max_steps)?;
        // BREAK pauses; an unattended run simply continues
        while outcome == RunOutcome::Stopped(HaltReason::Break) && machine.steps() < config.max_steps {
            outcome = machine.run(config.max_steps - machine.steps())?;
        }
        Ok::<_, MachineError>((machine, outcome))
    });

    let (machine, outcome) = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Machine error: {}", e);
            std::process::exit(1);
        }
    };

    let regs = machine.registers();
    println!();
    println!("--- Result ---");
    println!("Outcome:      {:?}", outcome);
    println!("Micro-steps:  {}", machine.steps());
    println!("Instructions: {}", machine.instructions());
    println!("ACC: {}", regs.accumulator);
    println!("VR:  {}", regs.value);
    println!("PC:  {}", regs.program_counter);
    println!("AR:  {}", regs.address);

    if outcome == RunOutcome::StepLimit {
        println!();
        println!("Reached the step limit ({}). Use --max-steps to increase.", config.max_steps);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: &MachineConfig) {
    use vonneumann::tui::run_debugger;

    println!("Loading: {}", path);
    let words = load_program(path);

    if let Err(e) = run_debugger(words, config) {
        eprintln!("Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: &MachineConfig) {
    eprintln!("The debugger requires the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use vonneumann::{assemble, save_image, ProgramImage};
    use vonneumann::asm::disasm::disassemble_word;

    let out_path = output.unwrap_or_else(|| {
        source_path.strip_suffix(".asm").unwrap_or(source_path).to_string() + ".img"
    });

    println!("Assembling: {} -> {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Assembled {} words", words.len());

    let image = ProgramImage {
        source: words.iter().map(|w| disassemble_word(*w)).collect(),
        words,
    };

    if let Err(e) = save_image(&out_path, &image) {
        eprintln!("Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    use vonneumann::disassemble;

    let words = load_program(path);
    println!();
    println!("{}", disassemble(&words));
}
