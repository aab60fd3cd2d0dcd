//! Observer port.
//!
//! The machine reports every observable change through an [`Observer`].
//! Notifications for a micro-step are queued while the step runs and
//! delivered in order once its mutations are complete, so an observer
//! never sees a half-applied step.

use super::registers::{Phase, Register};
use serde::{Serialize, Deserialize};

/// Why the machine reported a halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HaltReason {
    /// A HALT instruction executed.
    Halt,
    /// The program counter tried to advance past the last cell.
    EndOfMemory,
    /// A BREAK instruction executed; the machine continues on the next step.
    Break,
}

impl HaltReason {
    /// True for reasons that leave the machine in the terminal phase.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, HaltReason::Break)
    }
}

/// Register-transfer micro-operations, used as source-line hints for
/// step-by-step visualization. The discriminant is the line number in
/// [`MICROCODE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MicroOp {
    Idle = 0,
    AddressIndirect = 1,
    MemoryToAccumulator = 2,
    JumpFromMemory = 3,
    MemoryToValue = 4,
    MemoryToInstruction = 5,
    ProgramCounterToAddress = 6,
    ImmediateToAccumulator = 7,
    JumpImmediate = 8,
    ImmediateToValue = 9,
    OperandToAddress = 10,
    Alu = 11,
    Not = 12,
    AccumulatorToMemory = 13,
}

impl MicroOp {
    #[inline]
    pub const fn line(self) -> usize {
        self as usize
    }

    pub fn text(self) -> &'static str {
        MICROCODE[self.line()]
    }
}

/// Register-transfer listing, one line per [`MicroOp`].
pub const MICROCODE: [&str; 14] = [
    "-",
    "AR <- M[AR] mod N",
    "ACC <- M[AR]",
    "PC <- M[AR] mod N",
    "VR <- M[AR]",
    "IR <- M[AR]",
    "AR <- PC mod N",
    "ACC <- IR.operand",
    "PC <- IR.operand mod N",
    "VR <- IR.operand",
    "AR <- IR.operand mod N",
    "ACC <- ACC op VR",
    "ACC <- NOT ACC",
    "M[AR] <- ACC",
];

/// Receives notifications from the machine. Every method defaults to a no-op.
pub trait Observer {
    /// A register took a new value.
    fn register_changed(&mut self, _reg: Register, _value: i64) {}

    /// Memory was written; `memory` is the full post-step snapshot.
    fn memory_changed(&mut self, _memory: &[i32]) {}

    /// The machine entered a new phase.
    fn phase_changed(&mut self, _phase: Phase) {}

    /// Human-readable description of the micro-step just performed.
    fn trace(&mut self, _line: &str) {}

    /// The machine halted or reached a BREAK.
    fn halted(&mut self, _reason: HaltReason) {}

    /// Highlight a line of the microcode listing.
    fn highlight_line(&mut self, _op: MicroOp) {}
}

impl<T: Observer + ?Sized> Observer for Box<T> {
    fn register_changed(&mut self, reg: Register, value: i64) {
        (**self).register_changed(reg, value)
    }
    fn memory_changed(&mut self, memory: &[i32]) {
        (**self).memory_changed(memory)
    }
    fn phase_changed(&mut self, phase: Phase) {
        (**self).phase_changed(phase)
    }
    fn trace(&mut self, line: &str) {
        (**self).trace(line)
    }
    fn halted(&mut self, reason: HaltReason) {
        (**self).halted(reason)
    }
    fn highlight_line(&mut self, op: MicroOp) {
        (**self).highlight_line(op)
    }
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Register { register: Register, value: i64 },
    /// Memory changed; the snapshot is taken when the event is delivered.
    Memory,
    Phase { phase: Phase },
    Trace { line: String },
    Halted { reason: HaltReason },
    Highlight { op: MicroOp },
}

impl Event {
    /// Deliver this event.
    pub fn dispatch<O: Observer + ?Sized>(&self, observer: &mut O, memory: &[i32]) {
        match self {
            Event::Register { register, value } => observer.register_changed(*register, *value),
            Event::Memory => observer.memory_changed(memory),
            Event::Phase { phase } => observer.phase_changed(*phase),
            Event::Trace { line } => observer.trace(line),
            Event::Halted { reason } => observer.halted(*reason),
            Event::Highlight { op } => observer.highlight_line(*op),
        }
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Collects notifications for later inspection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recorder {
    /// Events in delivery order.
    pub events: Vec<Event>,
    /// Latest memory snapshot seen.
    pub memory: Vec<i32>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, leaving the recorder empty.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Trace lines in order.
    pub fn traces(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            Event::Trace { line } => Some(line.as_str()),
            _ => None,
        })
    }

    /// Phases entered, in order.
    pub fn phases(&self) -> Vec<Phase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Phase { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Halt notifications, in order.
    pub fn halts(&self) -> Vec<HaltReason> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Halted { reason } => Some(*reason),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Observer for Recorder {
    fn register_changed(&mut self, register: Register, value: i64) {
        self.events.push(Event::Register { register, value });
    }

    fn memory_changed(&mut self, memory: &[i32]) {
        self.memory.clear();
        self.memory.extend_from_slice(memory);
        self.events.push(Event::Memory);
    }

    fn phase_changed(&mut self, phase: Phase) {
        self.events.push(Event::Phase { phase });
    }

    fn trace(&mut self, line: &str) {
        self.events.push(Event::Trace { line: line.to_owned() });
    }

    fn halted(&mut self, reason: HaltReason) {
        self.events.push(Event::Halted { reason });
    }

    fn highlight_line(&mut self, op: MicroOp) {
        self.events.push(Event::Highlight { op });
    }
}

/// Forwards notifications to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn register_changed(&mut self, reg: Register, value: i64) {
        log::trace!("{} = {}", reg, value);
    }

    fn memory_changed(&mut self, memory: &[i32]) {
        log::trace!("memory updated ({} cells)", memory.len());
    }

    fn phase_changed(&mut self, phase: Phase) {
        log::debug!("phase {}", phase);
    }

    fn trace(&mut self, line: &str) {
        log::debug!("{}", line);
    }

    fn halted(&mut self, reason: HaltReason) {
        log::info!("halted: {:?}", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microcode_lines_match_ops() {
        assert_eq!(MicroOp::Idle.line(), 0);
        assert_eq!(MicroOp::AccumulatorToMemory.line(), MICROCODE.len() - 1);
        assert_eq!(MicroOp::MemoryToInstruction.text(), "IR <- M[AR]");
    }

    #[test]
    fn test_recorder_dispatch() {
        let mut rec = Recorder::new();
        let events = [
            Event::Phase { phase: Phase::Execute },
            Event::Memory,
            Event::Trace { line: "hello".into() },
            Event::Halted { reason: HaltReason::Break },
        ];
        for event in &events {
            event.dispatch(&mut rec, &[1, 2, 3]);
        }
        assert_eq!(rec.events, events);
        assert_eq!(rec.memory, vec![1, 2, 3]);
        assert_eq!(rec.traces().collect::<Vec<_>>(), vec!["hello"]);
        assert_eq!(rec.phases(), vec![Phase::Execute]);
        assert_eq!(rec.halts(), vec![HaltReason::Break]);
        assert_eq!(rec.drain().len(), 4);
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_log_observer_accepts_every_event() {
        let events = [
            Event::Register { register: Register::Accumulator, value: -1 },
            Event::Memory,
            Event::Phase { phase: Phase::Halt },
            Event::Trace { line: "Decode HALT".into() },
            Event::Halted { reason: HaltReason::EndOfMemory },
            Event::Highlight { op: MicroOp::Alu },
        ];
        let mut log_observer = LogObserver;
        for event in &events {
            event.dispatch(&mut log_observer, &[0, 1]);
        }

        let mut boxed: Box<dyn Observer> = Box::new(LogObserver);
        for event in &events {
            event.dispatch(&mut boxed, &[]);
        }
    }

    #[test]
    fn test_boxed_observer_forwards() {
        let mut boxed: Box<Recorder> = Box::new(Recorder::new());
        Event::Trace { line: "x".into() }.dispatch(&mut boxed, &[]);
        assert_eq!(boxed.events.len(), 1);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_string(&Event::Halted { reason: HaltReason::EndOfMemory }).unwrap();
        assert_eq!(json, r#"{"kind":"halted","reason":"EndOfMemory"}"#);
    }

    #[test]
    fn test_break_is_not_terminal() {
        assert!(!HaltReason::Break.is_terminal());
        assert!(HaltReason::Halt.is_terminal());
        assert!(HaltReason::EndOfMemory.is_terminal());
    }
}
