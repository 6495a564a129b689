// The interactive debugger: a termion TUI that draws CPU state plus the
// disassembly window and reads single-letter commands off stdin. Register
// table left, PC/flags strip below it, the next instruction off to the
// side, command prompt at the bottom.

use crate::asm::AssembledImage;
use crate::vm::cpu::Cpu;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::io::prelude::*;
use termion::{clear, color, cursor};

#[derive(PartialEq, Clone, Copy)]
enum DebugCommand {
    Quit,
    Step,
    Continue,
    SetBreakpoint(Option<u16>),
    DeleteBreakpoint(Option<u16>),
}

pub struct Debugger {
    breakpoints: HashSet<u16>,
    running: bool,
    last_cmd: DebugCommand,
    debug_map: std::collections::BTreeMap<u16, String>,
}

impl Debugger {
    /// Builds a debugger over the union of a program's and the kernel's
    /// debug maps, so stepping through a `call @ktxt_print` still shows
    /// readable labels instead of raw addresses.
    pub fn new(program: &AssembledImage, kernel: &AssembledImage) -> Self {
        let mut debug_map = std::collections::BTreeMap::new();
        for (addr, text) in program.debug_map.iter().chain(kernel.debug_map.iter()) {
            debug_map.insert(*addr, text.clone());
        }
        Debugger { breakpoints: HashSet::new(), running: false, last_cmd: DebugCommand::Step, debug_map }
    }

    fn current_line(&self, pc: u16) -> &str {
        self.debug_map
            .range(..=pc)
            .next_back()
            .map(|(_, text)| text.as_str())
            .unwrap_or("???")
    }

    fn get_command(&mut self) -> DebugCommand {
        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap();
        let mut words = input.split_whitespace();
        match words.next() {
            Some("q") => DebugCommand::Quit,
            Some("s") | Some("n") => DebugCommand::Step,
            Some("c") => DebugCommand::Continue,
            Some("b") => DebugCommand::SetBreakpoint(words.next().and_then(parse_address)),
            Some("d") => DebugCommand::DeleteBreakpoint(words.next().and_then(parse_address)),
            _ => self.last_cmd,
        }
    }

    fn draw(&self, cpu: &Cpu) {
        print!("{}{}", clear::All, cursor::Goto(1, 1));
        println!("{}", CpuState(cpu));
        println!("{r}next: {n}", r = cursor::Goto(1, 15), n = self.current_line(cpu.pc));
        if !self.breakpoints.is_empty() {
            let marks: Vec<String> = self.breakpoints.iter().map(|a| format!("{:#06x}", a)).collect();
            println!("{r}breakpoints: {b}", r = cursor::Goto(1, 16), b = marks.join(", "));
        }
        println!(
            "{r}n/s step, c continue, b/d <addr> set/delete breakpoint, q quit",
            r = cursor::Goto(1, 18)
        );
        print!("{r}> ", r = cursor::Goto(1, 19));
        io::stdout().flush().ok();
    }

    /// Drives one round of the debugger loop. Returns `false` once the user
    /// quits. When `running` is set from a previous `c`, stops early only
    /// if `cpu.pc` lands on a breakpoint.
    pub fn should_pause(&mut self, cpu: &Cpu) -> bool {
        !self.running || self.breakpoints.contains(&cpu.pc)
    }

    pub fn prompt(&mut self, cpu: &Cpu) -> bool {
        self.running = false;
        self.draw(cpu);
        match self.get_command() {
            DebugCommand::Quit => false,
            DebugCommand::Step => {
                self.last_cmd = DebugCommand::Step;
                true
            }
            DebugCommand::Continue => {
                self.running = true;
                true
            }
            DebugCommand::SetBreakpoint(Some(addr)) => {
                self.breakpoints.insert(addr);
                self.prompt(cpu)
            }
            DebugCommand::SetBreakpoint(None) => self.prompt(cpu),
            DebugCommand::DeleteBreakpoint(Some(addr)) => {
                self.breakpoints.remove(&addr);
                self.prompt(cpu)
            }
            DebugCommand::DeleteBreakpoint(None) => self.prompt(cpu),
        }
    }
}

fn parse_address(text: &str) -> Option<u16> {
    let text = text.trim_start_matches("0x");
    u16::from_str_radix(text, 16).ok()
}

struct CpuState<'a>(&'a Cpu);

impl<'a> fmt::Display for CpuState<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cpu = self.0;
        writeln!(f, "{r}registers", r = cursor::Goto(1, 2))?;
        for row in 0..4 {
            let mut line = String::new();
            for col in 0..4 {
                let index = row * 4 + col;
                line.push_str(&format!("${:<2}={:02x}  ", index, cpu.reg(index)));
            }
            writeln!(f, "{r}{line}", r = cursor::Goto(1, 3 + row as u16), line = line)?;
        }
        writeln!(
            f,
            "{r}$16(sp)={sp:02x}  pc={c}{pc:#06x}{reset}",
            r = cursor::Goto(1, 8),
            sp = cpu.reg(16),
            c = color::Fg(color::Yellow),
            pc = cpu.pc,
            reset = color::Fg(color::Reset),
        )?;
        writeln!(
            f,
            "{r}carry={c} ie={ie} zero={z} negative={n}",
            r = cursor::Goto(1, 9),
            c = cpu.flags.carry as u8,
            ie = cpu.flags.interrupt_enable as u8,
            z = cpu.flags.zero as u8,
            n = cpu.flags.negative as u8,
        )
    }
}
