use asm16::{assemble, Assembly, Register};
use expect_test::expect;

use super::{Cpu, CpuConfig, CpuError};
use crate::device::{BankedMemory, Memory};
use crate::memory::{Device, MemoryError, MemoryMapper};

fn machine(src: &str) -> (Cpu, Assembly) {
    let assembly = assemble(src).unwrap();
    let cpu = load(&assembly.bytes);
    (cpu, assembly)
}

fn load(bytes: &[u8]) -> Cpu {
    let mut memory = MemoryMapper::new();
    memory.map(Memory::shared(0x10000), 0x0000, 0xFFFF, true);
    memory.load(0x0000, bytes).unwrap();
    Cpu::new(memory, CpuConfig::default())
}

fn run_to_halt(cpu: &mut Cpu) {
    for _ in 0..10_000 {
        if cpu.step().unwrap() {
            return;
        }
    }
    panic!("machine didn't halt\n{}", cpu.dump());
}

#[test]
fn alu_results() {
    let (mut cpu, _) = machine(
        "    mov $0003, r1
    sub $0001, r1   ; acc = r1 - 1
    mov acc, r2
    sub r1, $0010   ; acc = $10 - r1
    mov acc, r3
    lsf r1, $02
    rsf r1, $01
    not r1
    hlt",
    );
    run_to_halt(&mut cpu);
    expect![[r#"
        pc  0x001b
        acc 0xfff9
        r1  0x0006
        r2  0x0002
        r3  0x000d
        r4  0x0000
        r5  0x0000
        r6  0x0000
        r7  0x0000
        r8  0x0000
        sp  0xfffe
        fp  0xfffe
        mb  0x0000
        im  0xffff
    "#]]
    .assert_eq(&cpu.dump());
}

#[test]
fn arithmetic_wraps() {
    let (mut cpu, _) = machine(
        "mov $FFFF, r1
mov $0002, r2
add r1, r2
mov acc, r3
mul $8000, r2
mov acc, r4
lsf r2, $0F
hlt",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R3), 0x0001);
    assert_eq!(cpu.reg(Register::R4), 0x0000);
    assert_eq!(cpu.reg(Register::R2), 0x0000);
}

#[test]
fn counting_loop() {
    let (mut cpu, _) = machine(
        "    mov $0005, r1
    mov $0000, r2
loop:
    add r1, r2
    mov acc, r2
    dec r1
    mov $0000, acc
    jne r1, &[!loop]
    hlt",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R2), 0x000F);
    assert_eq!(cpu.reg(Register::R1), 0);
}

#[test]
fn jumps_compare_operand_with_acc() {
    let (mut cpu, _) = machine(
        "    mov $0005, acc
    jgt $0004, &[!wrong]
    jlt $0004, &[!less]
    hlt
wrong:
    mov $0002, r1
    hlt
less:
    mov $0001, r1
    hlt",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R1), 1);
}

#[test]
fn memory_operands() {
    let (mut cpu, _) = machine(
        "    mov $0004, r1
    mov $BEEF, &[!table + $0004]
    mov &r1, r2
    mov !table, &r1, r3
    mov r3, &0000
    mov &0000, r4
    hlt
data16 table = { $0001, $0002, $0003 }",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R3), 0xBEEF);
    assert_eq!(cpu.reg(Register::R4), 0xBEEF);
    // r1 points at the second instruction: its opcode, then the first byte of $BEEF
    assert_eq!(cpu.reg(Register::R2), 0x1BBE);
}

#[test]
fn push_and_pop() {
    let (mut cpu, _) = machine(
        "mov $0005, r1
psh $1234
psh r1
pop r2
pop r3
hlt",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R2), 0x0005);
    assert_eq!(cpu.reg(Register::R3), 0x1234);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
}

#[test]
fn call_and_return() {
    let (mut cpu, _) = machine(
        "    mov $1111, r1
    mov $2222, r8
    psh $AAAA
    psh $0001       ; one argument
    cal !sub
    mov $BEEF, r2
    hlt
sub:
    mov $5555, r1
    mov $6666, r8
    psh $7777
    ret",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R1), 0x1111);
    assert_eq!(cpu.reg(Register::R8), 0x2222);
    assert_eq!(cpu.reg(Register::R2), 0xBEEF);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
    assert_eq!(cpu.reg(Register::Fp), 0xFFFE);
}

#[test]
fn call_through_register() {
    let (mut cpu, _) = machine(
        "    mov !sub, r3
    psh $0000
    cal r3
    hlt
sub:
    mov $0009, r4
    ret",
    );
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R4), 0x0009);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
    assert_eq!(cpu.reg(Register::Fp), 0xFFFE);
}

const INTERRUPT: &str = "    mov $1234, r1
    int $3
    mov $0001, r2
    hlt
handler:
    mov $9999, r1
    rti";

fn with_handler(src: &str) -> Cpu {
    let (mut cpu, assembly) = machine(src);
    let handler = assembly.address_of("handler").unwrap();
    cpu.memory_mut().set16(0x1000 + 3 * 2, handler).unwrap();
    cpu
}

#[test]
fn interrupt_and_return() {
    let mut cpu = with_handler(INTERRUPT);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert!(cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::Pc), 0x000C);

    cpu.step().unwrap();
    assert_eq!(cpu.reg(Register::R1), 0x9999);
    cpu.step().unwrap();
    assert!(!cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::Pc), 0x0007);
    assert_eq!(cpu.reg(Register::R1), 0x1234);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
    assert_eq!(cpu.reg(Register::Fp), 0xFFFE);

    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R2), 1);
}

#[test]
fn nested_interrupt_returns_to_the_interrupted_code() {
    let (mut cpu, assembly) = machine(
        "    mov $0011, r1
    mov $0012, r2
    mov $0013, r3
    mov $0014, r4
    mov $0015, r5
    mov $0016, r6
    mov $0017, r7
    mov $0018, r8
    int $3
    mov $0001, acc
    hlt
outer:
    mov $9991, r1
    mov $9998, r8
    int $4
    mov $7777, r2
    rti
inner:
    rti",
    );
    let outer = assembly.address_of("outer").unwrap();
    let inner = assembly.address_of("inner").unwrap();
    cpu.memory_mut().set16(0x1006, outer).unwrap();
    cpu.memory_mut().set16(0x1008, inner).unwrap();

    for _ in 0..9 {
        cpu.step().unwrap();
    }
    assert!(cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::Pc), outer);
    let (sp, fp) = (cpu.reg(Register::Sp), cpu.reg(Register::Fp));

    for _ in 0..3 {
        cpu.step().unwrap();
    }
    // only the outermost interrupt saves state
    assert_eq!(cpu.reg(Register::Pc), inner);
    assert!(cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::Sp), sp);
    assert_eq!(cpu.reg(Register::Fp), fp);

    cpu.step().unwrap();
    assert!(!cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::Pc), 0x0023);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
    assert_eq!(cpu.reg(Register::Fp), 0xFFFE);
    let general: Vec<_> = Register::GENERAL.iter().map(|&r| cpu.reg(r)).collect();
    assert_eq!(general, [0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18]);

    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::Acc), 1);
    assert_eq!(cpu.reg(Register::R2), 0x12);
}

#[test]
fn interrupt_line_wraps() {
    let mut cpu = with_handler(&INTERRUPT.replace("int $3", "int $13"));
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert!(cpu.in_interrupt_handler());
}

#[test]
fn masked_interrupt_is_ignored() {
    let mut cpu = with_handler(&INTERRUPT.replace("mov $1234, r1", "mov $FFF7, im"));
    run_to_halt(&mut cpu);
    assert!(!cpu.in_interrupt_handler());
    assert_eq!(cpu.reg(Register::R1), 0);
    assert_eq!(cpu.reg(Register::R2), 1);
    assert_eq!(cpu.reg(Register::Sp), 0xFFFE);
}

#[test]
fn bank_switching() {
    let src = "mov $0001, mb
mov $AAAA, &0010
mov $0002, mb
mov $BBBB, &0010
mov $0001, mb
mov &0010, r1
hlt";
    let assembly = assemble(src).unwrap();
    let mut cpu = Cpu::new(MemoryMapper::new(), CpuConfig::default());
    let banks = BankedMemory::shared(4, 0x100, cpu.bank_selector());
    cpu.memory_mut().map(Memory::shared(0x10000), 0x0000, 0xFFFF, true);
    cpu.memory_mut().map(banks.clone(), 0x0000, 0x00FF, false);
    cpu.memory_mut().load(0x0100, &assembly.bytes).unwrap();
    cpu.set_reg(Register::Pc, 0x0100);

    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R1), 0xAAAA);
    let banks = banks.borrow();
    assert_eq!(banks.bank(0).unwrap().get16(0x10).unwrap(), 0);
    assert_eq!(banks.bank(2).unwrap().get16(0x10).unwrap(), 0xBBBB);
    drop(banks);

    cpu.set_register("mb", 6).unwrap();
    assert_eq!(cpu.memory().get16(0x10).unwrap(), 0xBBBB);
}

#[test]
fn register_byte_wraps() {
    // register byte $10 is r1 after wrapping
    let mut cpu = load(&[0x10, 0x00, 0x42, 0x10, 0xFF]);
    run_to_halt(&mut cpu);
    assert_eq!(cpu.reg(Register::R1), 0x0042);
}

#[test]
fn registers_by_name() {
    let mut cpu = load(&[0xFF]);
    cpu.set_register("acc", 5).unwrap();
    assert_eq!(cpu.get_register("ACC").unwrap(), 5);
    assert_eq!(cpu.get_register("sp").unwrap(), 0xFFFE);
    let err = cpu.get_register("r9").unwrap_err();
    assert!(matches!(err, CpuError::UnknownRegister(_)));
    expect!["unknown register `r9`"].assert_eq(&err.to_string());
    assert!(cpu.set_register("", 1).is_err());
}

#[test]
fn invalid_opcode() {
    let mut cpu = load(&[0x00]);
    let err = cpu.step().unwrap_err();
    expect!["invalid opcode 0x00 at 0x0000"].assert_eq(&err.to_string());
}

#[test]
fn unmapped_fetch() {
    let mut cpu = Cpu::new(MemoryMapper::new(), CpuConfig::default());
    let err = cpu.step().unwrap_err();
    assert!(matches!(
        err,
        CpuError::Memory(MemoryError::Unmapped { address: 0 })
    ));
}

#[test]
fn halt_is_final() {
    let mut cpu = load(&[0xFF, 0x00]);
    assert!(cpu.step().unwrap());
    assert!(cpu.halted());
    assert!(cpu.step().unwrap());
    assert_eq!(cpu.reg(Register::Pc), 1);
}

#[test]
fn view_memory() {
    let (cpu, _) = machine("mov $0003, r1");
    expect!["0x0000: 0x10 0x00 0x03 0x02"].assert_eq(&cpu.view_memory_at(0, 4).unwrap());
}

#[tokio::test]
async fn run_until_halt() {
    let (mut cpu, _) = machine(
        "    mov $0003, r1
loop:
    inc r2
    dec r1
    mov $0000, acc
    jne r1, &[!loop]
    hlt",
    );
    cpu.run().await.unwrap();
    assert!(cpu.halted());
    assert_eq!(cpu.reg(Register::R2), 3);
}
