// The scheduler: paces CPU cycles against wall-clock time, raises
// the periodic interrupt, and exposes run/stop/pause/step controls. The
// loop is explicit rather than a registered timer callback — a
// `tick(elapsed)` method a host loop calls every iteration, which is also
// what keeps this single-threaded (a background-thread timer would need the
// whole `Cpu` to be `Send`, which its `Box<dyn SyscallHandler>` need not be).

use crate::render::{HostSurface, TextRenderer};
use crate::vm::cpu::Cpu;
use log::{debug, trace, warn};
use std::time::Duration;

/// Cycles executed per scheduler tick.
pub const QUANTUM: u32 = 240;
/// Cycles between interrupt checks: 4x the quantum.
pub const INTERRUPT_PERIOD: u32 = QUANTUM * 4;
/// Wall-clock period of one batch, ~16.777 ms.
pub const TICK: Duration = Duration::from_micros(16_777);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
    Paused,
}

pub struct Scheduler {
    state: RunState,
    cycle_counter: u32,
    accumulated: Duration,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { state: RunState::Stopped, cycle_counter: 0, accumulated: Duration::ZERO }
    }

    /// Resets the cycle counter, reloads PC from the reset vector, and
    /// begins ticking.
    pub fn run(&mut self, cpu: &mut Cpu) {
        cpu.reset();
        self.cycle_counter = 0;
        self.accumulated = Duration::ZERO;
        self.state = RunState::Running;
        debug!("scheduler: run from reset vector pc={:#06x}", cpu.pc);
    }

    /// Halts the ticker. Any partially executed batch has
    /// already run to completion of its current cycle by the time a host
    /// loop observes this, since cycles never suspend mid-instruction.
    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
        self.accumulated = Duration::ZERO;
        debug!("scheduler: stopped");
    }

    /// Toggles ticking on/off without resetting state.
    pub fn pause(&mut self) {
        self.state = match self.state {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Stopped => RunState::Stopped,
        };
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state == RunState::Stopped
    }

    /// Executes exactly one cycle; dispatches one interrupt if the cycle
    /// counter crosses the interrupt period.
    pub fn step(&mut self, cpu: &mut Cpu, surface: &mut dyn HostSurface) {
        if let Err(e) = cpu.step() {
            warn!("{}", e);
            cpu.halted = true;
            return;
        }
        self.cycle_counter = self.cycle_counter.wrapping_add(1);
        if self.cycle_counter % INTERRUPT_PERIOD == 0 && cpu.flags.interrupt_enable {
            self.deliver_interrupt(cpu, surface);
        }
    }

    fn deliver_interrupt(&mut self, cpu: &mut Cpu, surface: &mut dyn HostSurface) {
        trace!("scheduler: dispatching interrupt at pc={:#06x}", cpu.pc);
        // Render before raising: the text buffer reflects state as
        // of the instant the interrupt fires, not after the handler runs.
        TextRenderer::render(&mut cpu.memory, surface);
        cpu.deliver_interrupt();
    }

    /// Paces cycles against `elapsed` wall-clock time. The host
    /// calls this once per iteration of its own loop; batching semantics
    /// (quantum size, interrupt cadence) are identical no matter how often
    /// the host calls in, since leftover time accumulates across calls.
    pub fn tick(&mut self, elapsed: Duration, cpu: &mut Cpu, surface: &mut dyn HostSurface) {
        if self.state != RunState::Running {
            return;
        }
        self.accumulated += elapsed;
        while self.accumulated >= TICK {
            self.accumulated -= TICK;
            for _ in 0..QUANTUM {
                if cpu.halted {
                    // hlt: "pause execution (scheduler enters paused state)".
                    self.state = RunState::Paused;
                    return;
                }
                self.step(cpu, surface);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{Mnemonic, Mode};
    use crate::render::NullSurface;

    fn opcode(mnemonic: Mnemonic, mode: Mode) -> u8 {
        crate::isa::opcode_for(mnemonic, mode).unwrap().to_byte()
    }

    #[test]
    fn run_resets_and_loads_pc_from_reset_vector() {
        let mut cpu = Cpu::new();
        cpu.memory.write16(crate::vm::memory::RESET_VECTOR, 0x0200);
        let mut sched = Scheduler::new();
        sched.run(&mut cpu);
        assert_eq!(cpu.pc, 0x0200);
        assert!(sched.is_running());
    }

    #[test]
    fn hlt_pauses_the_scheduler_mid_batch() {
        let mut cpu = Cpu::new();
        cpu.memory.load(&[opcode(Mnemonic::Hlt, Mode::O)]);
        let mut sched = Scheduler::new();
        sched.run(&mut cpu);
        let mut surface = NullSurface;
        sched.tick(TICK, &mut cpu, &mut surface);
        assert!(cpu.halted);
        assert!(!sched.is_running());
    }

    #[test]
    fn interrupt_round_trip_preserves_pc_and_stack_pointer() {
        let mut cpu = Cpu::new();
        // Handler at 0x300 is just `ret`.
        let ret_opcode = opcode(Mnemonic::Ret, Mode::O);
        cpu.memory.write(0x300, ret_opcode);
        cpu.memory.write16(crate::vm::memory::IRQ_VECTOR, 0x300);
        // Program: 960 `mov $0, $0` no-ops, enough to cross one interrupt period.
        let nop_opcode = opcode(Mnemonic::Mov, Mode::AB);
        cpu.memory.write16(crate::vm::memory::RESET_VECTOR, 0x0200);
        let mut addr = 0x0200u16;
        for _ in 0..(INTERRUPT_PERIOD as usize) {
            cpu.memory.write(addr, nop_opcode);
            cpu.memory.write(addr + 1, 0x00);
            addr = addr.wrapping_add(2);
        }
        let mut sched = Scheduler::new();
        sched.run(&mut cpu);
        cpu.flags.interrupt_enable = true;
        let sp_before = cpu.reg(16);
        let mut surface = NullSurface;
        for _ in 0..INTERRUPT_PERIOD {
            sched.step(&mut cpu, &mut surface);
        }
        assert_eq!(cpu.pc, 0x0200 + 2 * INTERRUPT_PERIOD as u16);
        assert_eq!(cpu.reg(16), sp_before);
    }
}
