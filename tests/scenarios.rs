//! End-to-end scenarios through the public API.

use vonneumann::cpu::{decode::encode, AluOp, Event, HaltReason, Phase, Recorder, Register};
use vonneumann::{assemble, load_image, save_image, Machine, MachineConfig, MachineError, Opcode, ProgramImage, RunOutcome};

fn word(mnemonic: &str, operand: u32) -> i32 {
    encode(Opcode::from_mnemonic(mnemonic).unwrap(), operand)
}

fn recorded(size: usize, program: &[i32]) -> Machine<Recorder> {
    let mut m = Machine::with_observer(size, Recorder::new()).unwrap();
    m.load_memory(program).unwrap();
    m.observer_mut().clear();
    m
}

#[test]
fn halt_takes_four_micro_steps() {
    let mut m = recorded(4, &[Opcode::HALT.byte() as i32 * (1 << 24), 0, 0, 0]);
    assert_eq!(m.phase(), Phase::Fetch);

    m.step().unwrap();
    assert_eq!(m.registers().address, 0);

    m.step().unwrap();
    assert_eq!(m.registers().instruction, m.memory()[0]);
    assert_eq!(m.phase(), Phase::Indirect);

    m.step().unwrap();
    assert_eq!(m.phase(), Phase::Execute);

    assert_eq!(m.step().unwrap(), Some(HaltReason::Halt));
    assert_eq!(m.phase(), Phase::Halt);

    let before = m.snapshot();
    let events = m.observer().events.len();
    assert_eq!(m.step().unwrap(), None);
    assert_eq!(m.snapshot(), before);
    assert_eq!(m.observer().events.len(), events);
    assert_eq!(m.observer().halts(), vec![HaltReason::Halt]);
}

#[test]
fn three_plus_four() {
    let program = assemble("LOADM 3\nADDM 4\nHALT").unwrap();
    let mut m = Machine::new(4).unwrap();
    m.load_memory(&program).unwrap();
    assert_eq!(m.run(1000).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
    assert_eq!(m.registers().accumulator, 7);
}

#[test]
fn division_by_zero_is_an_error() {
    let mut m = recorded(8, &[word("LOADM", 12), word("DIV", 5), word("HALT", 0)]);
    let err = m.run(1000).unwrap_err();
    assert_eq!(err, MachineError::DivisionByZero { op: AluOp::Div, pc: 1 });
    assert_eq!(m.registers().accumulator, 12);
    assert_eq!(m.registers().value, 0);
    assert!(!m.is_halted());
    assert!(err.to_string().contains("by zero"));
}

#[test]
fn jmpgt_on_zero_falls_through() {
    let mut m = recorded(4, &[word("JMPGT", 3), word("HALT", 0), 0, 2]);
    let pc_before = m.registers().program_counter;
    m.step_instruction().unwrap();
    assert_eq!(m.registers().program_counter, pc_before + 1);
    assert!(m.observer().traces().any(|t| t == "Jump condition not fulfilled"));
}

#[test]
fn countdown_loop_sums() {
    let source = "\
LOOP:   LOAD N
        JMPEQM DONE
        LOAD SUM
        ADD N
        STORE SUM
        LOAD N
        SUBM 1
        STORE N
        JMPM LOOP
DONE:   HALT
N:      DAT 5
SUM:    DAT 0
";
    let program = assemble(source).unwrap();
    let mut m = Machine::new(32).unwrap();
    m.load_memory(&program).unwrap();
    assert_eq!(m.run(10_000).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
    assert_eq!(m.memory()[10], 0);
    assert_eq!(m.memory()[11], 15);
    assert_eq!(m.registers().program_counter, 9);
}

#[test]
fn observer_sees_post_step_memory() {
    let mut m = recorded(4, &[word("LOADM", 9), word("STORE", 3), word("HALT", 0)]);
    m.run(100).unwrap();
    assert_eq!(m.observer().memory[3], 9);
    let store_events: Vec<_> = m
        .observer()
        .events
        .iter()
        .filter(|e| matches!(e, Event::Memory))
        .collect();
    assert_eq!(store_events.len(), 1);
    assert!(m.observer().events.contains(&Event::Register {
        register: Register::Accumulator,
        value: 9,
    }));
}

#[test]
fn config_limits_the_machine() {
    let config = MachineConfig::from_json(r#"{ "memory_size": 4, "max_steps": 30 }"#).unwrap();
    let mut m = Machine::from_config(&config, Recorder::new()).unwrap();
    assert_eq!(m.memory_size(), 4);
    m.load_memory(&[word("JMPM", 0)]).unwrap();
    assert_eq!(m.run(config.max_steps).unwrap(), RunOutcome::StepLimit);
    assert!(m.load_memory(&[0; 5]).is_err());
}

#[test]
fn image_file_runs() {
    let path = std::env::temp_dir().join(format!("vonneumann-scenario-{}.img", std::process::id()));
    let image = ProgramImage::new(assemble("LOADM 2\nMULTM 21\nHALT").unwrap());
    save_image(&path, &image).unwrap();
    let loaded = load_image(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let mut m = Machine::new(8).unwrap();
    m.load_memory(&loaded.words).unwrap();
    m.run(1000).unwrap();
    assert_eq!(m.registers().accumulator, 42);
}
