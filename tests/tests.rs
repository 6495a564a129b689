// End-to-end integration tests driving the real assembler, console, and
// scheduler together rather than one module in isolation, exercising the
// crate's public API from outside.

use frame::render::NullSurface;
use frame::vm::memory::{FRAMEBUFFER_BASE, TEXT_BUFFER_BASE};
use frame::{Assembler, Console};

fn run_to_halt(console: &mut Console) {
    let mut surface = NullSurface;
    let mut guard = 0;
    while !console.cpu.halted {
        console.scheduler.step(&mut console.cpu, &mut surface);
        guard += 1;
        assert!(guard < 1_000_000, "program never halted");
    }
}

#[test]
fn a_program_assembles_and_runs_to_completion() {
    let mut console = Console::new().expect("kernel assembles");
    console
        .load_program(
            r#"
            mov $1, 10
            mov $2, 0
            @loop
            inc $2
            equ $1, $2
            brt @done
            jmp @loop
            @done
            hlt
            "#,
        )
        .expect("program assembles");
    run_to_halt(&mut console);
    assert_eq!(console.cpu.reg(2), 10);
}

#[test]
fn forward_and_backward_label_references_resolve_to_the_same_address() {
    let image = Assembler::new(
        r#"
        jmp @forward
        @back
        hlt
        @forward
        jmp @back
        "#,
    )
    .assemble()
    .expect("labels resolve");
    assert!(image.labels.contains_key("forward"));
    assert!(image.labels.contains_key("back"));
}

#[test]
fn interrupt_fires_mid_program_and_returns_control() {
    let mut console = Console::new().expect("kernel assembles");
    console
        .load_program("sei\n@loop\njmp @loop")
        .expect("program assembles");

    // Handler just sets a flag register and returns. Installed after
    // `load_program` since the program image occupies every address
    // outside the kernel and font regions.
    console.cpu.memory.write16(frame::vm::memory::IRQ_VECTOR, 0x0300);
    let ret_opcode = frame::isa::opcode_for(frame::isa::Mnemonic::Ret, frame::isa::Mode::O).unwrap().to_byte();
    let mov_opcode = frame::isa::opcode_for(frame::isa::Mnemonic::Mov, frame::isa::Mode::AK).unwrap().to_byte();
    console.cpu.memory.write(0x0300, mov_opcode);
    console.cpu.memory.write(0x0301, 15);
    console.cpu.memory.write(0x0302, 0xff);
    console.cpu.memory.write(0x0303, ret_opcode);

    let mut surface = NullSurface;
    // One full interrupt period (960 cycles) plus a margin crosses the
    // boundary the scheduler raises the interrupt on.
    for _ in 0..(frame::vm::scheduler::INTERRUPT_PERIOD + 10) {
        console.scheduler.step(&mut console.cpu, &mut surface);
    }
    assert_eq!(console.cpu.reg(15), 0xff);
}

#[test]
fn rendering_a_character_lights_up_the_expected_framebuffer_cell() {
    let mut console = Console::new().expect("kernel assembles");
    console.cpu.memory.write(TEXT_BUFFER_BASE, b'A');
    frame::TextRenderer::render(&mut console.cpu.memory, &mut NullSurface);
    // 'A' has a lit pixel in the middle of its top row (see font.rs).
    let mut any_lit = false;
    for x in 0..8u16 {
        if console.cpu.memory.read(FRAMEBUFFER_BASE + x) != 0 {
            any_lit = true;
        }
    }
    assert!(any_lit, "expected at least one lit pixel for glyph 'A'");
}

#[test]
fn kernel_print_routine_writes_a_full_string_into_the_text_buffer() {
    let mut console = Console::new().expect("kernel assembles");
    console
        .load_program(
            r#"
            mov %0x02, 0x00
            mov %0x03, 0x03
            call @ktxt_print
            hlt
            .addr 0x0300
            .byte 72, 0
            "#,
        )
        .expect("program references kernel symbols");
    run_to_halt(&mut console);
    assert_eq!(console.cpu.memory.text_cell(0), 72);
}
