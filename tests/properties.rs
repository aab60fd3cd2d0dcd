//! Property tests for the cycle engine and codec.

use proptest::prelude::*;
use vonneumann::cpu::decode::{decode, encode};
use vonneumann::cpu::{AddrMode, AluOp, Opcode, Operation, Phase, Registers};
use vonneumann::{Machine, RunOutcome};

/// Opcodes that never jump, pause, or write memory.
fn straight_line_opcodes() -> Vec<Opcode> {
    Opcode::all()
        .filter(|op| {
            !matches!(
                op.operation(),
                Operation::Jump | Operation::JumpIf(_) | Operation::Break | Operation::Store
            )
        })
        .collect()
}

fn straight_line_word() -> impl Strategy<Value = i32> {
    let opcodes = straight_line_opcodes();
    (0..opcodes.len(), 0u32..=0xFF_FFFF).prop_map(move |(i, operand)| encode(opcodes[i], operand))
}

/// Step through one instruction, counting (INDIRECT, EXECUTE) micro-steps.
fn count_phases<O: vonneumann::Observer>(m: &mut Machine<O>) -> (u32, u32) {
    let (mut indirect, mut execute) = (0, 0);
    loop {
        match m.phase() {
            Phase::Indirect => indirect += 1,
            Phase::Execute => execute += 1,
            _ => {}
        }
        m.step().unwrap();
        if m.is_halted() || (m.phase() == Phase::Fetch && m.registers().micro == 0) {
            return (indirect, execute);
        }
    }
}

proptest! {
    #[test]
    fn programs_without_jumps_halt(
        size in 1usize..48,
        program in prop::collection::vec(straight_line_word(), 0..48),
    ) {
        let program: Vec<i32> = program.into_iter().take(size).collect();
        let mut m = Machine::new(size).unwrap();
        m.load_memory(&program).unwrap();

        // At most six micro-steps per cell, plus the final one
        match m.run(6 * size as u64 + 1) {
            Ok(RunOutcome::Stopped(reason)) => prop_assert!(reason.is_terminal()),
            Ok(RunOutcome::StepLimit) => prop_assert!(false, "did not halt"),
            // DIV/MOD by a zero cell stops early
            Err(e) => prop_assert!(e.to_string().contains("by zero")),
        }
    }

    #[test]
    fn reset_is_idempotent(
        program in prop::collection::vec(any::<i32>(), 0..16),
        steps in 0u64..64,
    ) {
        let mut m = Machine::new(16).unwrap();
        m.load_memory(&program).unwrap();
        let _ = m.run(steps);

        m.reset();
        let first = m.snapshot();
        m.reset();
        let second = m.snapshot();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first.registers, &Registers::new());
        prop_assert_eq!(first.registers.phase, Phase::Fetch);
        prop_assert!(!first.registers.jmp_flag);
        prop_assert!(first.memory.iter().all(|&c| c == 0));
    }

    #[test]
    fn unknown_bytes_behave_as_nop(byte in Opcode::COUNT as u32..=255, operand in 0u32..=0xFF_FFFF) {
        let unknown = ((byte << 24) | operand) as i32;
        prop_assert_eq!(decode(unknown).opcode, Opcode::NOP);

        let mut a = Machine::new(4).unwrap();
        a.load_memory(&[unknown]).unwrap();
        let mut b = Machine::new(4).unwrap();
        b.load_memory(&[encode(Opcode::NOP, operand)]).unwrap();

        prop_assert_eq!(count_phases(&mut a), count_phases(&mut b));
        let (ra, rb) = (a.registers(), b.registers());
        prop_assert_eq!(ra.accumulator, rb.accumulator);
        prop_assert_eq!(ra.value, rb.value);
        prop_assert_eq!(ra.program_counter, rb.program_counter);
        prop_assert_eq!(ra.phase, rb.phase);
    }

    #[test]
    fn alu_step_counts(op in 0..AluOp::ALL.len(), mode in 0..3usize) {
        let alu = AluOp::ALL[op];
        let mode = [AddrMode::Direct, AddrMode::Indirect, AddrMode::Immediate][mode];
        let opcode = Opcode::new(Operation::Alu(alu), mode).unwrap();

        // M[7] = 6 and M[6] = 7, so every mode reads a non-zero operand
        let mut m = Machine::new(8).unwrap();
        m.load_memory(&[encode(opcode, 7), 0, 0, 0, 0, 0, 7, 6]).unwrap();

        let (indirect, execute) = count_phases(&mut m);
        prop_assert_eq!(execute, 2);
        prop_assert_eq!(indirect, if mode == AddrMode::Indirect { 2 } else { 1 });
    }
}
