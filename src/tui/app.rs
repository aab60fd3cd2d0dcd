//! Debugger application state and logic.

use crate::asm::disasm::disassemble_word;
use crate::cpu::{Event, HaltReason, Machine, MicroOp, Recorder};
use crate::MachineConfig;
use std::collections::{HashSet, VecDeque};

/// Trace lines kept for display.
const TRACE_CAPACITY: usize = 200;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine<Recorder>,
    /// Loaded program, restored on reset.
    pub program: Vec<i32>,
    /// Breakpoints (by instruction address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Recent trace lines, oldest first.
    pub trace: VecDeque<String>,
    /// Microcode line highlighted by the last step.
    pub highlight: MicroOp,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<i32>, config: &MachineConfig) -> Result<Self, crate::MachineError> {
        let mut machine = Machine::from_config(config, Recorder::new())?;
        machine.load_memory(&program)?;

        let mut app = Self {
            machine,
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            trace: VecDeque::new(),
            highlight: MicroOp::Idle,
            mem_scroll: 0,
        };
        app.collect_events();
        Ok(app)
    }

    /// Perform one micro-step.
    pub fn step(&mut self) {
        if self.machine.is_halted() {
            self.status = format!("Machine halted: {:?}", self.machine.halt_reason());
            self.running = false;
            return;
        }

        let result = self.machine.step();
        self.collect_events();
        match result {
            Ok(Some(reason)) => self.report_halt(reason),
            Ok(None) => {
                self.status = format!(
                    "{} micro {} | PC={}",
                    self.machine.phase(),
                    self.machine.registers().micro,
                    self.machine.registers().program_counter
                );
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Step to the start of the next instruction.
    pub fn step_instruction(&mut self) {
        if self.machine.is_halted() {
            self.step();
            return;
        }

        let result = self.machine.step_instruction();
        self.collect_events();
        match result {
            Ok(Some(reason)) => self.report_halt(reason),
            Ok(None) => {
                self.status = format!(
                    "Next: {} at PC={}",
                    disassemble_word(self.current_word()),
                    self.machine.registers().program_counter
                );
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, break, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.machine.is_halted() {
            self.running = false;
            self.status = format!("Halted after {} steps", self.machine.steps());
            return;
        }

        self.step_instruction();

        // Check for breakpoint at the next instruction
        let pc = self.machine.registers().program_counter;
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
        }
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.registers().program_counter;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reset the machine and reload the program.
    pub fn reset(&mut self) {
        self.machine.reset();
        if let Err(e) = self.machine.load_memory(&self.program) {
            self.status = format!("Reload failed: {}", e);
        } else {
            self.status = "Reset. Ready.".into();
        }
        self.running = false;
        self.trace.clear();
        self.collect_events();
    }

    /// Get disassembly around the current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.machine.registers().program_counter;
        let memory = self.machine.memory();
        let start = pc.saturating_sub(lines / 2);
        let end = (start + lines).min(memory.len());

        (start..end)
            .map(|addr| (addr, disassemble_word(memory[addr]), addr == pc))
            .collect()
    }

    /// Memory rows for the scrolled view: (address, word).
    pub fn memory_rows(&self, rows: usize) -> Vec<(usize, i32)> {
        self.machine.memory_window(self.mem_scroll, rows)
    }

    fn current_word(&self) -> i32 {
        let pc = self.machine.registers().program_counter;
        self.machine.memory()[pc]
    }

    fn report_halt(&mut self, reason: HaltReason) {
        self.running = false;
        self.status = match reason {
            HaltReason::Break => format!(
                "BREAK at PC={}; press 'r' or 's' to continue",
                self.machine.registers().program_counter.saturating_sub(1)
            ),
            HaltReason::Halt => format!("HALT after {} instructions", self.machine.instructions()),
            HaltReason::EndOfMemory => "Ran off the end of memory".into(),
        };
    }

    /// Move observer events into the display state.
    fn collect_events(&mut self) {
        for event in self.machine.observer_mut().drain() {
            match event {
                Event::Trace { line } => {
                    if self.trace.len() == TRACE_CAPACITY {
                        self.trace.pop_front();
                    }
                    self.trace.push_back(line);
                }
                Event::Highlight { op } => self.highlight = op,
                _ => {}
            }
        }
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<i32>, config: &MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut app = DebuggerApp::new(program, config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('n') => {
                            app.running = false;
                            app.step_instruction();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            if app.mem_scroll + 1 < app.machine.memory_size() {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
