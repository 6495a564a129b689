// Top-level wiring: a `Console` owns the CPU, its scheduler, and the
// kernel image, and exposes the load/run/step surface a host (the binary,
// or a test) drives. It owns the scheduler directly, since FRAME's host
// loop needs to call `tick` rather than let the console block forever in
// its own run loop.

pub mod asm;
pub mod debugger;
pub mod error;
pub mod font;
pub mod host;
pub mod isa;
pub mod kernel;
pub mod render;
pub mod vm;

pub use asm::{AssembledImage, Assembler};
pub use error::{AsmError, SourcePos, VmError};
pub use render::{FillColour, HostSurface, NullSurface, TextRenderer};
pub use vm::{button_for_key, Button, Buttons, Cpu, Flags, Memory, NoopSyscalls, Scheduler, SyscallHandler};

use vm::memory::{FONT_AREA, KERNEL_REGION};

/// A fully wired console: the CPU, its scheduler, and the kernel image
/// assembled once at construction. `load_program` re-assembles and installs
/// a user program on top of a freshly reset machine without disturbing the
/// kernel or the default font.
pub struct Console {
    pub cpu: Cpu,
    pub scheduler: Scheduler,
    kernel: AssembledImage,
}

impl Console {
    /// Assembles the kernel and seeds a freshly reset CPU with it and the
    /// default font. Fails only if the checked-in kernel source itself is
    /// broken.
    pub fn new() -> Result<Self, AsmError> {
        let kernel = kernel::assemble()?;
        let cpu = Cpu::new();
        let mut console = Console { cpu, scheduler: Scheduler::new(), kernel };
        console.restore_boot_rom();
        Ok(console)
    }

    /// Re-copies the canonical kernel image and default font into their
    /// fixed regions. A running guest program can write anywhere in the
    /// address space, including the kernel and font regions, so this has to
    /// run on every reset, not just at construction, or a prior program's
    /// stray writes there would stick around forever.
    fn restore_boot_rom(&mut self) {
        let start = *KERNEL_REGION.start() as usize;
        let end = *KERNEL_REGION.end() as usize;
        self.cpu.memory.load_at(*KERNEL_REGION.start(), &self.kernel.image[start..=end]);
        self.cpu.memory.load_at(vm::memory::FONT_BASE, &font::default_font());
    }

    /// Returns an assembler seeded with the kernel's labels and defines, so
    /// a guest program can `call @ktxt_print` and friends.
    pub fn assembler_for(&self, source: &str) -> Assembler {
        Assembler::new(source).with_external_info(self.kernel.labels.clone(), self.kernel.defines.clone())
    }

    /// Assembles `source` against the kernel's symbol table and loads the
    /// result into the console, then starts the scheduler. Restores the
    /// kernel and font regions first, undoing any corruption the previous
    /// program wrote there, then clobbers neither region while loading the
    /// new program even if its image is large enough to otherwise overlap
    /// them.
    pub fn load_program(&mut self, source: &str) -> Result<AssembledImage, AsmError> {
        let program = self.assembler_for(source).assemble()?;
        self.restore_boot_rom();
        self.cpu.memory.load_except(&program.image, &[KERNEL_REGION, FONT_AREA]);
        self.cpu.memory.write16(vm::memory::RESET_VECTOR, program.start);
        self.scheduler.run(&mut self.cpu);
        Ok(program)
    }

    pub fn kernel_image(&self) -> &AssembledImage {
        &self.kernel
    }

    /// Advances the console by one wall-clock tick worth of cycles,
    /// rendering through `surface` on every interrupt the scheduler raises.
    pub fn tick(&mut self, elapsed: std::time::Duration, surface: &mut dyn HostSurface) {
        self.scheduler.tick(elapsed, &mut self.cpu, surface);
    }

    pub fn set_input(&mut self, buttons: Buttons) {
        self.cpu.memory.set_input(buttons.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_a_program_does_not_disturb_the_kernel_or_font() {
        let mut console = Console::new().expect("kernel assembles");
        let kernel_image = console.kernel_image().image.clone();
        let font = font::default_font();
        console.load_program("mov $1, 1\nhlt").expect("program assembles");
        for addr in vm::memory::KERNEL_REGION {
            assert_eq!(console.cpu.memory.read(addr), kernel_image[addr as usize]);
        }
        for (i, &byte) in font.iter().enumerate() {
            assert_eq!(console.cpu.memory.read(vm::memory::FONT_BASE.wrapping_add(i as u16)), byte);
        }
    }

    #[test]
    fn reloading_a_program_restores_kernel_bytes_the_previous_program_corrupted() {
        let mut console = Console::new().expect("kernel assembles");
        let kernel_image = console.kernel_image().image.clone();
        console.load_program("mov %0xe000, 0xff\nhlt").expect("program assembles");
        while !console.cpu.halted {
            console.cpu.step().expect("valid opcode stream");
        }
        assert_eq!(console.cpu.memory.read(0xe000), 0xff, "program should have corrupted the kernel byte");

        console.load_program("hlt").expect("program assembles");
        assert_eq!(console.cpu.memory.read(0xe000), kernel_image[0xe000]);
    }

    #[test]
    fn a_program_can_call_into_the_kernel_text_helpers() {
        let mut console = Console::new().expect("kernel assembles");
        console
            .load_program("mov $1, 65\ncall @ktxt_putch\nhlt")
            .expect("program assembles against kernel symbols");
        while !console.cpu.halted {
            console.cpu.step().expect("valid opcode stream");
        }
        assert_eq!(console.cpu.memory.text_cell(0), 65);
    }
}
