//! Cycle engine.
//!
//! Drives the FETCH -> INDIRECT -> EXECUTE sequence one micro-step per call
//! to [`Machine::step`]. Every register, memory and phase change is queued as
//! an [`Event`] and flushed to the observer once the micro-step is complete.

use crate::config::MachineConfig;
use crate::cpu::decode::{self, AddrMode, AluOp, Instruction, Operation};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::observer::{Event, HaltReason, MicroOp, NullObserver, Observer};
use crate::cpu::registers::{Phase, Register, Registers};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// How a call to [`Machine::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The machine halted, ran off the end of memory, or reached a BREAK.
    Stopped(HaltReason),
    /// The step budget ran out first.
    StepLimit,
}

/// Serializable view of the whole machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: Registers,
    pub memory: Vec<i32>,
    pub instruction: Instruction,
    pub steps: u64,
    pub instructions: u64,
}

/// The stored-program machine.
pub struct Machine<O: Observer = NullObserver> {
    regs: Registers,
    mem: Memory,
    /// Instruction decoded in the current cycle.
    current: Instruction,
    /// Set when the machine entered the terminal phase.
    halt_reason: Option<HaltReason>,
    /// Notifications of the micro-step in progress.
    pending: Vec<Event>,
    observer: O,
    steps: u64,
    instructions: u64,
}

impl Machine<NullObserver> {
    /// Create a machine with `size` memory cells and no observer.
    pub fn new(size: usize) -> Result<Self, MachineError> {
        Self::with_observer(size, NullObserver)
    }
}

impl<O: Observer> Machine<O> {
    /// Create a machine reporting to `observer`.
    ///
    /// Construction is silent; call [`Machine::reset`] to publish the
    /// initial state.
    pub fn with_observer(size: usize, observer: O) -> Result<Self, MachineError> {
        Ok(Self {
            regs: Registers::new(),
            mem: Memory::new(size)?,
            current: Instruction::default(),
            halt_reason: None,
            pending: Vec::new(),
            observer,
            steps: 0,
            instructions: 0,
        })
    }

    pub fn from_config(config: &MachineConfig, observer: O) -> Result<Self, MachineError> {
        Self::with_observer(config.memory_size, observer)
    }

    /// Zero all registers and memory and return to FETCH.
    pub fn reset(&mut self) {
        self.clear_state();
        self.mem.clear();
        self.pending.push(Event::Memory);
        self.flush();
        log::debug!("machine reset ({} cells)", self.mem.len());
    }

    /// Replace memory contents wholesale and restart from address 0.
    ///
    /// Programs shorter than memory are zero-padded. On error nothing changes.
    pub fn load_memory(&mut self, words: &[i32]) -> Result<(), MachineError> {
        self.mem.load(words)?;
        self.clear_state();
        self.pending.push(Event::Memory);
        self.flush();
        log::debug!("loaded {} words into {} cells", words.len(), self.mem.len());
        Ok(())
    }

    /// Write a single cell, e.g. from an editor in a front end.
    pub fn write_memory(&mut self, addr: usize, value: i32) -> Result<(), MachineError> {
        self.mem.get(addr)?;
        self.mem.write(addr, value);
        self.pending.push(Event::Memory);
        self.flush();
        Ok(())
    }

    /// Perform exactly one micro-step.
    ///
    /// Returns the halt or pause reason raised by this step, if any. After the
    /// terminal phase is reached this is a no-op returning `Ok(None)`. On error
    /// the machine is left untouched and no notifications are sent.
    pub fn step(&mut self) -> Result<Option<HaltReason>, MachineError> {
        log::trace!(
            "step {}: {} micro {}",
            self.steps,
            self.regs.phase,
            self.regs.micro
        );
        let result = match self.regs.phase {
            Phase::Fetch => {
                self.fetch();
                Ok(())
            }
            Phase::Indirect => {
                self.indirect();
                Ok(())
            }
            Phase::Execute => self.execute(),
            Phase::Halt => return Ok(None),
        };

        if let Err(e) = result {
            self.pending.clear();
            return Err(e);
        }

        self.steps += 1;
        Ok(self.flush())
    }

    /// Step until the next FETCH begins or the machine stops.
    pub fn step_instruction(&mut self) -> Result<Option<HaltReason>, MachineError> {
        loop {
            if let Some(reason) = self.step()? {
                return Ok(Some(reason));
            }
            let regs = &self.regs;
            if regs.phase == Phase::Halt || (regs.phase == Phase::Fetch && regs.micro == 0) {
                return Ok(None);
            }
        }
    }

    /// Step until the machine halts, reaches a BREAK, or `max_steps` micro-steps ran.
    pub fn run(&mut self, max_steps: u64) -> Result<RunOutcome, MachineError> {
        for _ in 0..max_steps {
            if let Some(reason) = self.halt_reason {
                return Ok(RunOutcome::Stopped(reason));
            }
            if let Some(reason) = self.step()? {
                return Ok(RunOutcome::Stopped(reason));
            }
        }
        Ok(self.halt_reason.map_or(RunOutcome::StepLimit, RunOutcome::Stopped))
    }

    // ==================== Phases ====================

    fn fetch(&mut self) {
        match self.regs.micro {
            0 => {
                self.regs.address = self.mem.wrap(self.regs.program_counter as i64);
                self.notify(Register::Address);
                self.highlight(MicroOp::ProgramCounterToAddress);
                self.trace(format!(
                    "Set address register to program counter ({})",
                    self.regs.program_counter
                ));
                self.regs.micro = 1;
            }
            _ => {
                self.regs.instruction = self.mem.read(self.regs.address);
                self.notify(Register::Instruction);
                self.highlight(MicroOp::MemoryToInstruction);
                self.trace(format!(
                    "Load memory cell {} into instruction register",
                    self.regs.address
                ));
                self.regs.micro = 0;
                self.enter(Phase::Indirect);
            }
        }
    }

    fn indirect(&mut self) {
        if self.regs.micro == 0 {
            self.current = decode::decode(self.regs.instruction);
            self.trace(format!("Decode {}", self.current));
        }

        let mode = self.current.opcode.mode();
        if self.regs.micro > 0 {
            let pointer = self.mem.read(self.regs.address);
            self.regs.address = self.mem.wrap(pointer as i64);
            self.notify(Register::Address);
            self.highlight(MicroOp::AddressIndirect);
            self.trace(format!("Indirect address register to {}", self.regs.address));
        } else if mode.needs_address() {
            self.load_operand_address();
        }

        if self.regs.micro + 1 < mode.resolve_steps() {
            self.regs.micro += 1;
        } else {
            self.regs.micro = 0;
            self.enter(Phase::Execute);
        }
    }

    fn execute(&mut self) -> Result<(), MachineError> {
        let Instruction { opcode, operand } = self.current;
        let mode = opcode.mode();

        match opcode.operation() {
            Operation::Nop => {
                self.highlight(MicroOp::Idle);
                self.trace("NOP".into());
                self.advance_pc();
            }

            Operation::Halt => {
                self.highlight(MicroOp::Idle);
                self.trace("HALT".into());
                self.instructions += 1;
                self.halt(HaltReason::Halt);
            }

            Operation::Break => {
                self.trace("Breakpoint reached".into());
                self.pending.push(Event::Halted { reason: HaltReason::Break });
                self.advance_pc();
            }

            Operation::Load => {
                if mode == AddrMode::Immediate {
                    self.regs.accumulator = operand as i32;
                    self.notify(Register::Accumulator);
                    self.highlight(MicroOp::ImmediateToAccumulator);
                    self.trace(format!("Load value {} into accumulator", operand));
                } else {
                    self.regs.accumulator = self.mem.read(self.regs.address);
                    self.notify(Register::Accumulator);
                    self.highlight(MicroOp::MemoryToAccumulator);
                    self.trace(format!(
                        "Load memory cell {} ({}) into accumulator",
                        self.regs.address, self.regs.accumulator
                    ));
                }
                self.advance_pc();
            }

            Operation::Store => {
                self.mem.write(self.regs.address, self.regs.accumulator);
                self.pending.push(Event::Memory);
                self.highlight(MicroOp::AccumulatorToMemory);
                self.trace(format!(
                    "Store accumulator ({}) to memory cell {}",
                    self.regs.accumulator, self.regs.address
                ));
                self.advance_pc();
            }

            Operation::Alu(alu) => match self.regs.micro {
                0 => {
                    self.load_value(mode, operand);
                    self.regs.micro = 1;
                }
                _ => {
                    self.apply_alu(alu)?;
                    self.regs.micro = 0;
                    self.advance_pc();
                }
            },

            Operation::Not => {
                self.regs.accumulator = !self.regs.accumulator;
                self.notify(Register::Accumulator);
                self.highlight(MicroOp::Not);
                self.trace(format!("Invert accumulator, result {}", self.regs.accumulator));
                self.advance_pc();
            }

            Operation::Jump => self.jump(mode, operand),

            Operation::JumpIf(cond) => match self.regs.micro {
                0 => {
                    self.regs.jmp_flag = cond.test(self.regs.accumulator);
                    self.notify(Register::JumpFlag);
                    self.trace(format!(
                        "Test accumulator ({}) {} 0: {}",
                        self.regs.accumulator,
                        cond.symbol(),
                        self.regs.jmp_flag
                    ));
                    self.regs.micro = 1;
                }
                _ => {
                    self.regs.micro = 0;
                    if self.regs.jmp_flag {
                        self.jump(mode, operand);
                        self.regs.jmp_flag = false;
                        self.notify(Register::JumpFlag);
                    } else {
                        self.trace("Jump condition not fulfilled".into());
                        self.advance_pc();
                    }
                }
            },
        }

        Ok(())
    }

    // ==================== Micro-operations ====================

    /// AR := operand mod N
    fn load_operand_address(&mut self) {
        self.regs.address = self.mem.wrap(self.current.operand as i64);
        self.notify(Register::Address);
        self.highlight(MicroOp::OperandToAddress);
        self.trace(format!("Set address register to {}", self.regs.address));
    }

    /// VR := M[AR] or the immediate operand.
    fn load_value(&mut self, mode: AddrMode, operand: u32) {
        if mode == AddrMode::Immediate {
            self.regs.value = operand as i32;
            self.notify(Register::Value);
            self.highlight(MicroOp::ImmediateToValue);
            self.trace(format!("Load value {} into value register", operand));
        } else {
            self.regs.value = self.mem.read(self.regs.address);
            self.notify(Register::Value);
            self.highlight(MicroOp::MemoryToValue);
            self.trace(format!(
                "Load memory cell {} ({}) into value register",
                self.regs.address, self.regs.value
            ));
        }
    }

    /// ACC := ACC op VR. Fails without side effects on a zero divisor.
    fn apply_alu(&mut self, alu: AluOp) -> Result<(), MachineError> {
        let (acc, value) = (self.regs.accumulator, self.regs.value);
        let Some(result) = alu.apply(acc, value) else {
            log::warn!(
                "{} by zero at address {} (ACC={})",
                alu,
                self.regs.program_counter,
                acc
            );
            return Err(MachineError::DivisionByZero {
                op: alu,
                pc: self.regs.program_counter,
            });
        };

        self.regs.accumulator = result;
        self.notify(Register::Accumulator);
        self.highlight(MicroOp::Alu);
        self.trace(format!("{} {} {} = {}", acc, alu, value, result));
        Ok(())
    }

    /// PC := target, back to FETCH. Immediate targets come from the operand,
    /// all others from M[AR]; both are reduced modulo N.
    fn jump(&mut self, mode: AddrMode, operand: u32) {
        let target = if mode == AddrMode::Immediate {
            self.highlight(MicroOp::JumpImmediate);
            operand as i64
        } else {
            self.highlight(MicroOp::JumpFromMemory);
            self.mem.read(self.regs.address) as i64
        };
        self.regs.program_counter = self.mem.wrap(target);
        self.notify(Register::ProgramCounter);
        self.trace(format!("Jump: set program counter to {}", self.regs.program_counter));
        self.instructions += 1;
        self.enter(Phase::Fetch);
    }

    /// PC := PC + 1 and back to FETCH, or halt when PC is the last cell.
    fn advance_pc(&mut self) {
        self.instructions += 1;
        if self.regs.program_counter + 1 < self.mem.len() {
            self.regs.program_counter += 1;
            self.notify(Register::ProgramCounter);
            self.trace(format!(
                "Increase program counter to {}",
                self.regs.program_counter
            ));
            self.enter(Phase::Fetch);
        } else {
            self.trace("Program counter reached end of memory".into());
            self.halt(HaltReason::EndOfMemory);
        }
    }

    fn halt(&mut self, reason: HaltReason) {
        self.regs.micro = 0;
        self.halt_reason = Some(reason);
        self.enter(Phase::Halt);
        self.pending.push(Event::Halted { reason });
        log::debug!(
            "halted ({:?}) after {} steps, {} instructions",
            reason,
            self.steps + 1,
            self.instructions
        );
    }

    // ==================== Notification ====================

    fn enter(&mut self, phase: Phase) {
        if self.regs.phase != phase {
            self.regs.phase = phase;
            self.pending.push(Event::Phase { phase });
        }
    }

    fn notify(&mut self, register: Register) {
        let value = self.regs.get(register);
        self.pending.push(Event::Register { register, value });
    }

    fn highlight(&mut self, op: MicroOp) {
        self.pending.push(Event::Highlight { op });
    }

    fn trace(&mut self, line: String) {
        self.pending.push(Event::Trace { line });
    }

    /// Deliver queued events; returns the halt reason among them, if any.
    fn flush(&mut self) -> Option<HaltReason> {
        let mut halted = None;
        for event in self.pending.drain(..) {
            if let Event::Halted { reason } = &event {
                halted = Some(*reason);
            }
            event.dispatch(&mut self.observer, self.mem.cells());
        }
        halted
    }

    /// Zero the register file and counters, queueing the notifications.
    fn clear_state(&mut self) {
        self.regs.reset();
        self.current = Instruction::default();
        self.halt_reason = None;
        self.steps = 0;
        self.instructions = 0;
        for reg in Register::ALL {
            self.notify(reg);
        }
        self.pending.push(Event::Phase { phase: Phase::Fetch });
        self.highlight(MicroOp::Idle);
    }

    // ==================== Accessors ====================

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn phase(&self) -> Phase {
        self.regs.phase
    }

    pub fn memory(&self) -> &[i32] {
        self.mem.cells()
    }

    pub fn memory_size(&self) -> usize {
        self.mem.len()
    }

    /// `(address, word)` pairs for up to `count` cells from `start`.
    pub fn memory_window(&self, start: usize, count: usize) -> Vec<(usize, i32)> {
        self.mem.dump(start, count)
    }

    /// The instruction decoded in the current cycle.
    pub fn current_instruction(&self) -> Instruction {
        self.current
    }

    pub fn is_halted(&self) -> bool {
        self.regs.phase == Phase::Halt
    }

    /// Why the machine entered the terminal phase, if it has.
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// Micro-steps performed since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Instructions completed since the last reset.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.clone(),
            memory: self.mem.cells().to_vec(),
            instruction: self.current,
            steps: self.steps,
            instructions: self.instructions,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }
}

impl<O: Observer> std::fmt::Debug for Machine<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .field("current", &self.current)
            .field("steps", &self.steps)
            .finish()
    }
}

/// Errors that can occur while driving the machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("{op} by zero at address {pc}")]
    DivisionByZero { op: AluOp, pc: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Opcode};
    use crate::cpu::observer::Recorder;

    fn word(mnemonic: &str, operand: u32) -> i32 {
        encode(Opcode::from_mnemonic(mnemonic).unwrap(), operand)
    }

    fn machine(size: usize, program: &[i32]) -> Machine<Recorder> {
        let mut m = Machine::with_observer(size, Recorder::new()).unwrap();
        m.load_memory(program).unwrap();
        m.observer_mut().clear();
        m
    }

    /// Step until FETCH micro 0 and report (indirect steps, execute steps).
    fn count_phases(m: &mut Machine<Recorder>) -> (u32, u32) {
        let (mut indirect, mut execute) = (0, 0);
        loop {
            match m.phase() {
                Phase::Indirect => indirect += 1,
                Phase::Execute => execute += 1,
                Phase::Halt => break,
                Phase::Fetch => {}
            }
            m.step().unwrap();
            if m.phase() == Phase::Fetch && m.registers().micro == 0 || m.is_halted() {
                break;
            }
        }
        (indirect, execute)
    }

    #[test]
    fn test_zero_memory_rejected() {
        assert_eq!(
            Machine::new(0).unwrap_err(),
            MachineError::Memory(MemoryError::Empty)
        );
        assert!(matches!(
            Machine::new(usize::MAX),
            Err(MachineError::Memory(MemoryError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_halt_sequence() {
        let mut m = machine(4, &[word("HALT", 0)]);
        assert_eq!(m.phase(), Phase::Fetch);

        m.step().unwrap();
        assert_eq!(m.registers().address, 0);
        assert_eq!(m.phase(), Phase::Fetch);

        m.step().unwrap();
        assert_eq!(m.registers().instruction, 1 << 24);
        assert_eq!(m.phase(), Phase::Indirect);

        m.step().unwrap();
        assert_eq!(m.phase(), Phase::Execute);

        assert_eq!(m.step().unwrap(), Some(HaltReason::Halt));
        assert_eq!(m.phase(), Phase::Halt);
        assert_eq!(m.observer().halts(), vec![HaltReason::Halt]);

        let before = m.snapshot();
        m.observer_mut().clear();
        assert_eq!(m.step().unwrap(), None);
        assert_eq!(m.snapshot(), before);
        assert!(m.observer().events.is_empty());
    }

    #[test]
    fn test_add_immediate() {
        let mut m = machine(4, &[word("LOADM", 3), word("ADDM", 4), word("HALT", 0)]);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
        assert_eq!(m.registers().accumulator, 7);
        assert_eq!(m.instructions(), 3);
    }

    #[test]
    fn test_direct_and_indirect_operands() {
        // cell 6 holds 10, cell 7 points at cell 6
        let mut m = machine(
            8,
            &[word("LOAD", 6), word("ADDI", 7), word("STORE", 5), word("HALT", 0), 0, 0, 10, 6],
        );
        m.run(100).unwrap();
        assert_eq!(m.registers().accumulator, 20);
        assert_eq!(m.memory()[5], 20);
        assert_eq!(m.observer().memory[5], 20);
    }

    #[test]
    fn test_store_indirect() {
        let mut m = machine(8, &[word("LOADM", 9), word("STOREI", 7), word("HALT", 0), 0, 0, 0, 0, 4]);
        m.run(100).unwrap();
        assert_eq!(m.memory()[4], 9);
    }

    #[test]
    fn test_alu_ops() {
        let cases = [
            ("SUBM", 10, 3, 7),
            ("MULTM", 6, 7, 42),
            ("DIVM", 17, 5, 3),
            ("MODM", 17, 5, 2),
            ("ANDM", 0b1100, 0b1010, 0b1000),
            ("ORM", 0b1100, 0b1010, 0b1110),
        ];
        for (mnemonic, a, b, expected) in cases {
            let mut m = machine(4, &[word("LOADM", a), word(mnemonic, b), word("HALT", 0)]);
            m.run(100).unwrap();
            assert_eq!(m.registers().accumulator, expected, "{}", mnemonic);
        }
    }

    #[test]
    fn test_not() {
        let mut m = machine(4, &[word("LOADM", 5), word("NOT", 0), word("HALT", 0)]);
        m.run(100).unwrap();
        assert_eq!(m.registers().accumulator, !5);
    }

    #[test]
    fn test_add_wraps() {
        let mut m = machine(8, &[word("LOAD", 4), word("ADDM", 1), word("HALT", 0), 0, i32::MAX]);
        m.run(100).unwrap();
        assert_eq!(m.registers().accumulator, i32::MIN);
    }

    #[test]
    fn test_division_by_zero() {
        let mut m = machine(4, &[word("LOADM", 8), word("DIVM", 0), word("HALT", 0)]);
        let err = loop {
            match m.step() {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert_eq!(err, MachineError::DivisionByZero { op: AluOp::Div, pc: 1 });
        assert_eq!(m.registers().accumulator, 8);
        assert_eq!(m.phase(), Phase::Execute);

        let before = m.snapshot();
        m.observer_mut().clear();
        assert!(m.step().is_err());
        assert_eq!(m.snapshot(), before);
        assert!(m.observer().events.is_empty());
    }

    #[test]
    fn test_mod_by_zero_from_memory() {
        let mut m = machine(4, &[word("LOADM", 8), word("MOD", 3), word("HALT", 0), 0]);
        assert!(matches!(
            m.run(100),
            Err(MachineError::DivisionByZero { op: AluOp::Mod, .. })
        ));
    }

    #[test]
    fn test_micro_step_counts() {
        // ADD, ADDI, ADDM, NOT, HALT
        let mut m = machine(
            8,
            &[word("ADD", 7), word("ADDI", 7), word("ADDM", 1), word("NOT", 0), word("HALT", 0), 0, 0, 7],
        );
        assert_eq!(count_phases(&mut m), (1, 2));
        assert_eq!(count_phases(&mut m), (2, 2));
        assert_eq!(count_phases(&mut m), (1, 2));
        assert_eq!(count_phases(&mut m), (1, 1));
    }

    #[test]
    fn test_immediate_keeps_address_register() {
        // FETCH of cell 1 sets AR = 1; LOADM must not touch it afterwards
        let mut m = machine(4, &[word("NOP", 0), word("LOADM", 3), word("HALT", 0)]);
        m.step_instruction().unwrap();
        m.observer_mut().clear();
        m.step_instruction().unwrap();
        assert_eq!(m.registers().address, 1);
        assert_eq!(m.registers().accumulator, 3);
        let address_writes = m
            .observer()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Register { register: Register::Address, .. }))
            .count();
        assert_eq!(address_writes, 1);
    }

    #[test]
    fn test_jump_from_memory() {
        // JMP 5 -> M[5] = 3 -> HALT at 3
        let mut m = machine(8, &[word("JMP", 5), word("LOADM", 1), 0, word("HALT", 0), 0, 3]);
        m.run(100).unwrap();
        assert_eq!(m.registers().accumulator, 0);
        assert_eq!(m.registers().program_counter, 3);
        assert_eq!(m.halt_reason(), Some(HaltReason::Halt));
    }

    #[test]
    fn test_jump_immediate_wraps() {
        // JMPM 10 in 8 cells lands on 2
        let mut m = machine(8, &[word("JMPM", 10), 0, word("HALT", 0)]);
        m.step_instruction().unwrap();
        assert_eq!(m.registers().program_counter, 2);
    }

    #[test]
    fn test_negative_pointer_wraps() {
        let mut m = machine(4, &[word("JMP", 3), 0, word("HALT", 0), -2]);
        m.step_instruction().unwrap();
        assert_eq!(m.registers().program_counter, 2);
    }

    #[test]
    fn test_conditional_not_taken() {
        let mut m = machine(8, &[word("JMPGTM", 5), word("HALT", 0)]);
        let (_, execute) = count_phases(&mut m);
        assert_eq!(execute, 2);
        assert_eq!(m.registers().program_counter, 1);
        assert!(!m.registers().jmp_flag);
    }

    #[test]
    fn test_conditional_taken_clears_flag() {
        let mut m = machine(8, &[word("LOADM", 1), word("JMPGTM", 4), 0, 0, word("HALT", 0)]);
        m.step_instruction().unwrap();
        // fetch(2) + indirect(1) + test
        for _ in 0..4 {
            m.step().unwrap();
        }
        assert!(m.registers().jmp_flag);
        m.step().unwrap();
        assert!(!m.registers().jmp_flag);
        assert_eq!(m.registers().program_counter, 4);
        assert_eq!(m.phase(), Phase::Fetch);
    }

    #[test]
    fn test_conditional_indirect_target() {
        // acc == 0 so JMPEQI 6 jumps to M[M[6]] = M[7] = 3
        let mut m = machine(8, &[word("JMPEQI", 6), 0, 0, word("HALT", 0), 0, 0, 7, 3]);
        m.run(100).unwrap();
        assert_eq!(m.registers().program_counter, 3);
        assert_eq!(m.halt_reason(), Some(HaltReason::Halt));
    }

    #[test]
    fn test_break_continues() {
        let mut m = machine(4, &[word("BREAK", 0), word("LOADM", 2), word("HALT", 0)]);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::Break));
        assert_eq!(m.phase(), Phase::Fetch);
        assert_eq!(m.registers().program_counter, 1);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
        assert_eq!(m.registers().accumulator, 2);
    }

    #[test]
    fn test_end_of_memory_halts() {
        let mut m = machine(3, &[]);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::EndOfMemory));
        assert_eq!(m.registers().program_counter, 2);
        assert!(m.is_halted());
    }

    #[test]
    fn test_single_cell_memory() {
        let mut m = machine(1, &[word("LOADM", 4)]);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::EndOfMemory));
        assert_eq!(m.registers().accumulator, 4);
    }

    #[test]
    fn test_unknown_opcode_is_nop() {
        let mut m = machine(4, &[0x7F00_0001, word("HALT", 0)]);
        assert_eq!(m.run(100).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
        assert_eq!(m.registers().program_counter, 1);
        assert_eq!(m.registers().accumulator, 0);
    }

    #[test]
    fn test_step_limit() {
        let mut m = machine(4, &[word("JMPM", 0)]);
        assert_eq!(m.run(50).unwrap(), RunOutcome::StepLimit);
        assert_eq!(m.steps(), 50);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut m = machine(4, &[word("LOADM", 3), word("HALT", 0)]);
        m.run(100).unwrap();
        m.reset();
        assert_eq!(m.registers(), &Registers::new());
        assert!(m.memory().iter().all(|&c| c == 0));
        assert_eq!(m.halt_reason(), None);
        assert_eq!(m.steps(), 0);
        let phases = m.observer().phases();
        assert_eq!(phases.last(), Some(&Phase::Fetch));
    }

    #[test]
    fn test_notifications_follow_mutation() {
        let mut m = machine(4, &[word("LOADM", 3), word("STORE", 3), word("HALT", 0)]);
        m.run(100).unwrap();
        let events = m.observer().events.clone();
        assert!(events.contains(&Event::Register {
            register: Register::Accumulator,
            value: 3
        }));
        assert!(events.contains(&Event::Memory));
        assert_eq!(m.observer().memory, vec![word("LOADM", 3), word("STORE", 3), word("HALT", 0), 3]);
        assert_eq!(
            m.observer().phases(),
            vec![
                Phase::Indirect, Phase::Execute, Phase::Fetch,
                Phase::Indirect, Phase::Execute, Phase::Fetch,
                Phase::Indirect, Phase::Execute, Phase::Halt,
            ]
        );
    }

    #[test]
    fn test_memory_window() {
        let m = machine(4, &[5, 6, 7, 8]);
        assert_eq!(m.memory_window(2, 5), vec![(2, 7), (3, 8)]);
        assert!(m.memory_window(4, 1).is_empty());
    }

    #[test]
    fn test_write_memory_checks_range() {
        let mut m = machine(4, &[]);
        m.write_memory(3, 11).unwrap();
        assert_eq!(m.memory()[3], 11);
        assert!(m.write_memory(4, 1).is_err());
    }

    #[test]
    fn test_load_memory_too_large_leaves_state() {
        let mut m = machine(2, &[5, 6]);
        assert!(m.load_memory(&[1, 2, 3]).is_err());
        assert_eq!(m.memory(), &[5, 6]);
    }
}
