// The CPU core: fetch-decode-execute, instruction semantics, stack,
// flags, and interrupt entry.

use crate::error::VmError;
use crate::isa::Opcode;
use crate::vm::instruction::Instruction;
use crate::vm::memory::{Memory, IRQ_VECTOR, RESET_VECTOR, STACK_BASE};
use log::trace;

/// Hook for `hlt A` / `hlt K`. The default implementation is a no-op — a
/// pluggable handler can be installed for guest programs that want to
/// signal the host.
pub trait SyscallHandler {
    fn handle(&mut self, number: u16);
}

pub struct NoopSyscalls;

impl SyscallHandler for NoopSyscalls {
    fn handle(&mut self, _number: u16) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub carry: bool,
    pub interrupt_enable: bool,
    pub zero: bool,
    pub negative: bool,
}

pub struct Cpu {
    registers: [u8; 17],
    pub pc: u16,
    pub flags: Flags,
    pub memory: Memory,
    pub halted: bool,
    pub syscalls: Box<dyn SyscallHandler>,
}

const SP: usize = 16;

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            registers: [0; 17],
            pc: 0,
            flags: Flags::default(),
            memory: Memory::new(),
            halted: false,
            syscalls: Box::new(NoopSyscalls),
        }
    }

    /// Resets VM state and reloads PC from the reset vector.
    pub fn reset(&mut self) {
        self.registers = [0; 17];
        self.flags = Flags::default();
        self.halted = false;
        self.pc = self.memory.read16(RESET_VECTOR);
    }

    pub fn reg(&self, index: u8) -> u8 {
        self.registers[index as usize]
    }

    fn update_zn(&mut self, value: u8) {
        self.flags.zero = value == 0;
        self.flags.negative = (value >> 7) & 1 == 1;
    }

    /// Register write: R0 discards silently but the *stored* value
    /// (always 0) still drives the flag recompute.
    fn set_reg(&mut self, index: u8, value: u8) {
        let stored = if index == 0 {
            0
        } else {
            self.registers[index as usize] = value;
            value
        };
        self.update_zn(stored);
    }

    /// Memory write through an instruction (as opposed to renderer/loader
    /// writes, which bypass flag recompute — only guest-visible writes from
    /// executing an instruction update Zero/Negative).
    fn write_mem(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value);
        self.update_zn(value);
    }

    fn zero_page_pointer(&self, index: u8) -> u16 {
        let lo = self.memory.read(u16::from(index)) as u16;
        let hi = self.memory.read(u16::from(index.wrapping_add(1))) as u16;
        lo | (hi << 8)
    }

    fn push_byte(&mut self, value: u8) {
        let sp = self.reg(SP as u8);
        self.memory.write(STACK_BASE + u16::from(sp), value);
        self.registers[SP] = sp.wrapping_add(1);
    }

    fn pop_byte(&mut self) -> u8 {
        let sp = self.reg(SP as u8).wrapping_sub(1);
        self.registers[SP] = sp;
        self.memory.read(STACK_BASE + u16::from(sp))
    }

    fn push16(&mut self, value: u16) {
        self.push_byte((value >> 8) as u8);
        self.push_byte((value & 0xff) as u8);
    }

    fn pop16(&mut self) -> u16 {
        let lo = self.pop_byte() as u16;
        let hi = self.pop_byte() as u16;
        lo | (hi << 8)
    }

    fn fetch_byte(&mut self) -> u8 {
        let byte = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_addr(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        lo | (hi << 8)
    }

    /// One fetch-decode-execute cycle. Delivers an interrupt if `deliver_interrupt` is
    /// set, matching the scheduler's "render then raise" ordering.
    pub fn step(&mut self) -> Result<(), VmError> {
        if self.halted {
            return Ok(());
        }
        let opcode_pc = self.pc;
        let byte = self.fetch_byte();
        let instruction = self.decode(byte).ok_or(VmError::InvalidOpcode { pc: opcode_pc, byte })?;
        trace!("pc={:#06x} opcode={:#04x} instr={:?}", opcode_pc, byte, instruction);
        self.execute(instruction);
        Ok(())
    }

    /// Pushes PC and jumps to the IRQ vector. Does not touch
    /// Interrupt-enable.
    pub fn deliver_interrupt(&mut self) {
        let pc = self.pc;
        self.push16(pc);
        self.pc = self.memory.read16(IRQ_VECTOR);
    }

    fn decode(&mut self, byte: u8) -> Option<Instruction> {
        let opcode = Opcode::from_byte(byte)?;
        Some(match opcode {
            Opcode::HltO => Instruction::HltO,
            Opcode::HltA => Instruction::HltA { a: self.fetch_byte() & 0xf },
            Opcode::HltK => Instruction::HltK { k: self.fetch_byte() },
            Opcode::MovAK => {
                let a = self.fetch_byte() & 0xf;
                let k = self.fetch_byte();
                Instruction::MovAK { a, k }
            }
            Opcode::MovAP => {
                let a = self.fetch_byte() & 0xf;
                let p = self.fetch_addr();
                Instruction::MovAP { a, p }
            }
            Opcode::MovPA => {
                let p = self.fetch_addr();
                let a = self.fetch_byte() & 0xf;
                Instruction::MovPA { p, a }
            }
            Opcode::MovPK => {
                let p = self.fetch_addr();
                let k = self.fetch_byte();
                Instruction::MovPK { p, k }
            }
            Opcode::MovAB => {
                let byte = self.fetch_byte();
                Instruction::MovAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::MovAPB => {
                let p = self.fetch_addr();
                let byte = self.fetch_byte();
                Instruction::MovAPB { a: byte & 0xf, p, b: (byte >> 4) & 0xf }
            }
            Opcode::MovPAB => {
                let p = self.fetch_addr();
                let byte = self.fetch_byte();
                Instruction::MovPAB { p, a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::MovAPK => {
                let p = self.fetch_addr();
                let a = self.fetch_byte() & 0xf;
                let k = self.fetch_byte();
                Instruction::MovAPK { a, p, k }
            }
            Opcode::MovPAK => {
                let p = self.fetch_addr();
                let a = self.fetch_byte() & 0xf;
                let k = self.fetch_byte();
                Instruction::MovPAK { p, a, k }
            }
            Opcode::MovAIB => {
                let byte = self.fetch_byte();
                let i = self.fetch_byte();
                Instruction::MovAIB { a: byte & 0xf, i, b: (byte >> 4) & 0xf }
            }
            Opcode::MovAIK => {
                let a = self.fetch_byte() & 0xf;
                let i = self.fetch_byte();
                let k = self.fetch_byte();
                Instruction::MovAIK { a, i, k }
            }
            Opcode::JmpP => Instruction::JmpP { p: self.fetch_addr() },
            Opcode::JmpPA => {
                let p = self.fetch_addr();
                Instruction::JmpPA { p, a: self.fetch_byte() & 0xf }
            }
            Opcode::JmpPK => {
                let p = self.fetch_addr();
                Instruction::JmpPK { p, k: self.fetch_byte() }
            }
            Opcode::BrtP => Instruction::BrtP { p: self.fetch_addr() },
            Opcode::BrtPA => {
                let p = self.fetch_addr();
                Instruction::BrtPA { p, a: self.fetch_byte() & 0xf }
            }
            Opcode::BrtPK => {
                let p = self.fetch_addr();
                Instruction::BrtPK { p, k: self.fetch_byte() }
            }
            Opcode::BrfP => Instruction::BrfP { p: self.fetch_addr() },
            Opcode::BrfPA => {
                let p = self.fetch_addr();
                Instruction::BrfPA { p, a: self.fetch_byte() & 0xf }
            }
            Opcode::BrfPK => {
                let p = self.fetch_addr();
                Instruction::BrfPK { p, k: self.fetch_byte() }
            }
            Opcode::EquAB => {
                let byte = self.fetch_byte();
                Instruction::EquAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::EquAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::EquAK { a, k: self.fetch_byte() }
            }
            Opcode::LssAB => {
                let byte = self.fetch_byte();
                Instruction::LssAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::LssAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::LssAK { a, k: self.fetch_byte() }
            }
            Opcode::AndAB => {
                let byte = self.fetch_byte();
                Instruction::AndAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::AndAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::AndAK { a, k: self.fetch_byte() }
            }
            Opcode::OrAB => {
                let byte = self.fetch_byte();
                Instruction::OrAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::OrAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::OrAK { a, k: self.fetch_byte() }
            }
            Opcode::XorAB => {
                let byte = self.fetch_byte();
                Instruction::XorAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::XorAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::XorAK { a, k: self.fetch_byte() }
            }
            Opcode::NotO => Instruction::NotO,
            Opcode::NotA => Instruction::NotA { a: self.fetch_byte() & 0xf },
            Opcode::LshA => Instruction::LshA { a: self.fetch_byte() & 0xf },
            Opcode::RshA => Instruction::RshA { a: self.fetch_byte() & 0xf },
            Opcode::RolA => Instruction::RolA { a: self.fetch_byte() & 0xf },
            Opcode::RorA => Instruction::RorA { a: self.fetch_byte() & 0xf },
            Opcode::AddAB => {
                let byte = self.fetch_byte();
                Instruction::AddAB { a: byte & 0xf, b: (byte >> 4) & 0xf }
            }
            Opcode::AddAK => {
                let a = self.fetch_byte() & 0xf;
                Instruction::AddAK { a, k: self.fetch_byte() }
            }
            Opcode::IncA => Instruction::IncA { a: self.fetch_byte() & 0xf },
            Opcode::DecA => Instruction::DecA { a: self.fetch_byte() & 0xf },
            Opcode::CallP => Instruction::CallP { p: self.fetch_addr() },
            Opcode::RetO => Instruction::RetO,
            Opcode::PushA => Instruction::PushA { a: self.fetch_byte() & 0xf },
            Opcode::PushK => Instruction::PushK { k: self.fetch_byte() },
            Opcode::PopA => Instruction::PopA { a: self.fetch_byte() & 0xf },
            Opcode::PopO => Instruction::PopO,
            Opcode::SeiO => Instruction::SeiO,
            Opcode::SeiA => Instruction::SeiA { a: self.fetch_byte() & 0xf },
            Opcode::SeiK => Instruction::SeiK { k: self.fetch_byte() },
            Opcode::ChyO => Instruction::ChyO,
        })
    }

    fn execute(&mut self, instruction: Instruction) {
        use Instruction::*;
        match instruction {
            HltO => self.halted = true,
            HltA { a } => {
                let n = u16::from(self.reg(a));
                self.syscalls.handle(n);
                self.halted = true;
            }
            HltK { k } => {
                self.syscalls.handle(u16::from(k));
                self.halted = true;
            }
            MovAK { a, k } => self.set_reg(a, k),
            MovAB { a, b } => {
                let v = self.reg(b);
                self.set_reg(a, v);
            }
            MovAP { a, p } => {
                let v = self.memory.read(p);
                self.set_reg(a, v);
            }
            MovPA { p, a } => {
                let v = self.reg(a);
                self.write_mem(p, v);
            }
            MovPK { p, k } => self.write_mem(p, k),
            MovAPB { a, p, b } => {
                let addr = p.wrapping_add(u16::from(self.reg(b)));
                let v = self.memory.read(addr);
                self.set_reg(a, v);
            }
            MovPAB { p, a, b } => {
                let addr = p.wrapping_add(u16::from(self.reg(b)));
                let v = self.reg(a);
                self.write_mem(addr, v);
            }
            MovAPK { a, p, k } => {
                let addr = p.wrapping_add(u16::from(k));
                let v = self.memory.read(addr);
                self.set_reg(a, v);
            }
            MovPAK { p, a, k } => {
                let addr = p.wrapping_add(u16::from(k));
                let v = self.reg(a);
                self.write_mem(addr, v);
            }
            MovAIB { a, i, b } => {
                let base = self.zero_page_pointer(i);
                let addr = base.wrapping_add(u16::from(self.reg(b)));
                let v = self.memory.read(addr);
                self.set_reg(a, v);
            }
            MovAIK { a, i, k } => {
                let base = self.zero_page_pointer(i);
                let addr = base.wrapping_add(u16::from(k));
                let v = self.memory.read(addr);
                self.set_reg(a, v);
            }
            JmpP { p } => self.pc = p,
            JmpPA { p, a } => self.pc = p.wrapping_add(u16::from(self.reg(a))),
            JmpPK { p, k } => self.pc = p.wrapping_add(u16::from(k)),
            BrtP { p } => {
                if self.flags.zero {
                    self.pc = p;
                }
            }
            BrtPA { p, a } => {
                if self.flags.zero {
                    self.pc = p.wrapping_add(u16::from(self.reg(a)));
                }
            }
            BrtPK { p, k } => {
                if self.flags.zero {
                    self.pc = p.wrapping_add(u16::from(k));
                }
            }
            BrfP { p } => {
                if !self.flags.zero {
                    self.pc = p;
                }
            }
            BrfPA { p, a } => {
                if !self.flags.zero {
                    self.pc = p.wrapping_add(u16::from(self.reg(a)));
                }
            }
            BrfPK { p, k } => {
                if !self.flags.zero {
                    self.pc = p.wrapping_add(u16::from(k));
                }
            }
            EquAB { a, b } => self.flags.zero = self.reg(a) == self.reg(b),
            EquAK { a, k } => self.flags.zero = self.reg(a) == k,
            LssAB { a, b } => self.flags.zero = self.reg(a) < self.reg(b),
            LssAK { a, k } => self.flags.zero = self.reg(a) < k,
            AndAB { a, b } => {
                let v = self.reg(a) & self.reg(b);
                self.set_reg(a, v);
            }
            AndAK { a, k } => {
                let v = self.reg(a) & k;
                self.set_reg(a, v);
            }
            OrAB { a, b } => {
                let v = self.reg(a) | self.reg(b);
                self.set_reg(a, v);
            }
            OrAK { a, k } => {
                let v = self.reg(a) | k;
                self.set_reg(a, v);
            }
            XorAB { a, b } => {
                let v = self.reg(a) ^ self.reg(b);
                self.set_reg(a, v);
            }
            XorAK { a, k } => {
                let v = self.reg(a) ^ k;
                self.set_reg(a, v);
            }
            NotO => self.flags.zero = !self.flags.zero,
            NotA { a } => {
                let v = !self.reg(a);
                if a != 0 {
                    self.registers[a as usize] = v;
                }
                self.flags.zero = !self.flags.zero;
                self.flags.negative = (v >> 7) & 1 == 1;
            }
            LshA { a } => {
                let v = self.reg(a);
                let carry = (v >> 7) & 1 == 1;
                self.flags.carry = carry;
                self.set_reg(a, v << 1);
            }
            RshA { a } => {
                let v = self.reg(a);
                let carry = v & 1 == 1;
                self.flags.carry = carry;
                self.set_reg(a, v >> 1);
            }
            RolA { a } => {
                let v = self.reg(a);
                let carry_in = self.flags.carry as u8;
                self.flags.carry = (v >> 7) & 1 == 1;
                self.set_reg(a, (v << 1) | carry_in);
            }
            RorA { a } => {
                let v = self.reg(a);
                let carry_in = self.flags.carry as u8;
                self.flags.carry = v & 1 == 1;
                self.set_reg(a, (v >> 1) | (carry_in << 7));
            }
            AddAB { a, b } => {
                let (v, carry) = self.reg(a).overflowing_add(self.reg(b));
                self.flags.carry = carry;
                self.set_reg(a, v);
            }
            AddAK { a, k } => {
                let (v, carry) = self.reg(a).overflowing_add(k);
                self.flags.carry = carry;
                self.set_reg(a, v);
            }
            IncA { a } => {
                let v = self.reg(a).wrapping_add(1);
                self.set_reg(a, v);
            }
            DecA { a } => {
                let v = self.reg(a).wrapping_sub(1);
                self.set_reg(a, v);
            }
            CallP { p } => {
                let return_to = self.pc;
                self.push16(return_to);
                self.pc = p;
            }
            RetO => self.pc = self.pop16(),
            PushA { a } => {
                let v = self.reg(a);
                self.push_byte(v);
            }
            PushK { k } => self.push_byte(k),
            PopA { a } => {
                let v = self.pop_byte();
                self.set_reg(a, v);
            }
            PopO => {
                self.pop_byte();
            }
            SeiO => self.flags.interrupt_enable = true,
            SeiA { a } => self.flags.interrupt_enable = self.reg(a) != 0,
            SeiK { k } => self.flags.interrupt_enable = k != 0,
            ChyO => self.flags.zero = self.flags.carry,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{Mnemonic, Mode};

    fn opcode(mnemonic: Mnemonic, mode: Mode) -> u8 {
        crate::isa::opcode_for(mnemonic, mode).unwrap().to_byte()
    }

    #[test]
    fn hello_register_scenario() {
        let mut cpu = Cpu::new();
        let prog = [opcode(Mnemonic::Mov, Mode::AK), 1, 0x2a, opcode(Mnemonic::Hlt, Mode::O)];
        cpu.memory.load(&prog);
        cpu.pc = 0;
        cpu.step().unwrap();
        assert_eq!(cpu.reg(1), 0x2a);
        cpu.step().unwrap();
        assert!(cpu.halted);
    }

    #[test]
    fn indirect_load_scenario() {
        let mut cpu = Cpu::new();
        cpu.memory.write(0x10, 0x00);
        cpu.memory.write(0x11, 0x03);
        cpu.memory.write(0x0305, 0x77);
        let prog = [opcode(Mnemonic::Mov, Mode::AIK), 2, 0x10, 5];
        cpu.memory.load(&prog);
        cpu.pc = 0;
        cpu.step().unwrap();
        assert_eq!(cpu.reg(2), 0x77);
    }

    #[test]
    fn carry_through_shift_and_chy() {
        let mut cpu = Cpu::new();
        cpu.set_reg(3, 0x81);
        let prog = [
            opcode(Mnemonic::Lsh, Mode::A),
            3,
            opcode(Mnemonic::Chy, Mode::O),
        ];
        cpu.memory.load(&prog);
        cpu.pc = 0;
        cpu.step().unwrap();
        assert_eq!(cpu.reg(3), 0x02);
        assert!(cpu.flags.carry);
        cpu.step().unwrap();
        assert!(cpu.flags.zero);
    }

    #[test]
    fn call_then_ret_returns_to_byte_after_call() {
        let mut cpu = Cpu::new();
        // @main: call @callee ; hlt
        // @callee: ret
        let call_opcode = opcode(Mnemonic::Call, Mode::P);
        let ret_opcode = opcode(Mnemonic::Ret, Mode::O);
        let hlt_opcode = opcode(Mnemonic::Hlt, Mode::O);
        let prog = [call_opcode, 0x06, 0x00, hlt_opcode, 0, 0, ret_opcode];
        cpu.memory.load(&prog);
        cpu.pc = 0;
        let sp_before = cpu.reg(16);
        cpu.step().unwrap(); // call
        assert_eq!(cpu.pc, 6);
        cpu.step().unwrap(); // ret
        assert_eq!(cpu.pc, 3);
        assert_eq!(cpu.reg(16), sp_before);
    }

    #[test]
    fn register_zero_is_always_zero() {
        let mut cpu = Cpu::new();
        cpu.set_reg(0, 0xff);
        assert_eq!(cpu.reg(0), 0);
        assert!(cpu.flags.zero);
        assert!(!cpu.flags.negative);
    }

    #[test]
    fn unknown_opcode_is_a_defined_error() {
        let mut cpu = Cpu::new();
        cpu.memory.load(&[0xff]);
        cpu.pc = 0;
        let err = cpu.step().unwrap_err();
        assert!(matches!(err, VmError::InvalidOpcode { pc: 0, byte: 0xff }));
    }
}
