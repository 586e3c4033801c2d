//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::memory::{RAM_CHARACTERS, RAM_NIBBLES};
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

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(9),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: RAM and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_ram(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly view.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:03X}: {}", prefix, addr, instr);

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

/// Draw CPU state: index registers, accumulator, carry, stack and counters.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.machine.cpu;
    let value = Style::default().fg(Color::White);

    let register_row = |base: u8| {
        let mut spans = Vec::new();
        for i in base..base + 8 {
            spans.push(Span::raw(format!("R{:<2}", i)));
            spans.push(Span::styled(format!("{:X}  ", cpu.regs.get(i)), value));
        }
        Line::from(spans)
    };

    let stack: Vec<String> = cpu.stack.slots().iter().map(|a| format!("{:03X}", a)).collect();

    let content = vec![
        register_row(0),
        register_row(8),
        Line::from(vec![
            Span::raw("ACC: "),
            Span::styled(format!("{:X}", cpu.accumulator()), Style::default().fg(Color::Yellow)),
            Span::raw("   CY: "),
            Span::styled(
                format!("{}", u8::from(cpu.carry())),
                if cpu.carry() { Style::default().fg(Color::Green) } else { value },
            ),
            Span::raw("   PC: "),
            Span::styled(format!("{:03X}", cpu.pc()), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Stack: "),
            Span::styled(stack.join(" "), value),
            Span::raw(format!("   SP: {}  depth: {}", cpu.stack.pointer(), cpu.stack.depth())),
        ]),
        Line::from(vec![
            Span::raw("Instructions: "),
            Span::styled(format!("{}", cpu.instructions_executed()), Style::default().fg(Color::Cyan)),
            Span::raw("   Cycles: "),
            Span::styled(format!("{}", cpu.cycles_executed()), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("Out: "),
            Span::styled(format!("{:X}", app.machine.io.output(0)), value),
            Span::raw("   TEST: "),
            Span::styled(format!("{}", u8::from(app.machine.io.test_pin())), value),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the selected RAM bank, highlighting the latched SRC address.
fn draw_ram(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let ram = &app.machine.ram;
    let bank = ram.bank();

    let items: Vec<ListItem> = (0..RAM_CHARACTERS as u8)
        .map(|character| {
            let mut spans = vec![Span::raw(format!("{:X}: ", character))];
            for nibble in 0..RAM_NIBBLES as u8 {
                let v = ram.peek(bank, character, nibble);
                let selected = character == ram.character() && nibble == ram.nibble();

                let style = if selected {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if v != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:X} ", v), style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(format!(" RAM bank {} ", bank))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
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
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
