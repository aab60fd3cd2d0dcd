//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::asm::disasm::disassemble_word;
use crate::cpu::{Phase, MICROCODE};
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, registers, trace and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_trace(frame, left_chunks[2], app);
    draw_status(frame, left_chunks[3], app);

    // Right side: microcode, memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(MICROCODE.len() as u16 + 2),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_microcode(frame, right_chunks[0], app);
    draw_memory(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw disassembly around the program counter.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the register file.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = app.machine.registers();
    let label = Style::default().fg(Color::Gray);
    let value = Style::default().fg(Color::White);

    let content = vec![
        Line::from(vec![
            Span::styled("ACC: ", label),
            Span::styled(format!("{:>11}", regs.accumulator), value),
            Span::styled("   VR: ", label),
            Span::styled(format!("{:>11}", regs.value), value),
        ]),
        Line::from(vec![
            Span::styled("IR:  ", label),
            Span::styled(format!("0x{:08X}", regs.instruction as u32), value),
            Span::raw(format!("  {}", disassemble_word(regs.instruction))),
        ]),
        Line::from(vec![
            Span::styled("PC:  ", label),
            Span::styled(format!("{:>11}", regs.program_counter), Style::default().fg(Color::Yellow)),
            Span::styled("   AR: ", label),
            Span::styled(format!("{:>11}", regs.address), value),
        ]),
        Line::from(vec![
            Span::styled("JF:  ", label),
            Span::styled(format!("{}", regs.jmp_flag), value),
            Span::styled("   Micro: ", label),
            Span::styled(format!("{}", regs.micro), value),
            Span::styled("   Phase: ", label),
            Span::styled(regs.phase.label(), phase_style(regs.phase)),
        ]),
        Line::from(vec![
            Span::styled("Steps: ", label),
            Span::styled(format!("{}", app.machine.steps()), Style::default().fg(Color::Cyan)),
            Span::styled("   Instructions: ", label),
            Span::styled(format!("{}", app.machine.instructions()), Style::default().fg(Color::Cyan)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the microcode listing with the last executed line highlighted.
fn draw_microcode(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let current = app.highlight.line();

    let items: Vec<ListItem> = MICROCODE
        .iter()
        .enumerate()
        .map(|(line, text)| {
            let style = if line == current {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(format!("{:2} {}", line, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Microcode ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(list, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = app.machine.registers();
    let visible_rows = (area.height as usize).saturating_sub(2);

    let items: Vec<ListItem> = app
        .memory_rows(visible_rows)
        .into_iter()
        .map(|(addr, value)| {
            let text = format!("{:04}: {:>11}  {}", addr, value, disassemble_word(value));

            let style = if addr == regs.program_counter {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if addr == regs.address {
                Style::default().fg(Color::Cyan)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw the most recent trace lines.
fn draw_trace(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible = (area.height as usize).saturating_sub(2);
    let skip = app.trace.len().saturating_sub(visible);
    let lines: Vec<Line> = app.trace.iter().skip(skip).map(|l| Line::from(l.as_str())).collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default()
            .title(" Trace ")
            .borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Micro-step  n: Instruction  r: Run  p: Pause"),
        Line::from("b: Breakpoint  x: Reset  ↑↓: Scroll  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::Fetch => Style::default().fg(Color::Cyan),
        Phase::Indirect => Style::default().fg(Color::Magenta),
        Phase::Execute => Style::default().fg(Color::Green),
        Phase::Halt => Style::default().fg(Color::Red),
    }
}
