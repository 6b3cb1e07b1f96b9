use expect_test::{expect, Expect};

use super::{assemble, AssembleError, Assembler, Symbol};
use crate::Parser;

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn check(src: &str, expect: Expect) {
    let assembly = match assemble(src) {
        Ok(assembly) => assembly,
        Err(err) => panic!("{err}"),
    };
    expect.assert_eq(&hex(&assembly.bytes));
}

fn check_error(src: &str, expect: Expect) {
    expect.assert_eq(&assemble(src).unwrap_err().to_string());
}

#[test]
fn immediate_to_register() {
    let assembly = assemble("mov $1234, r1\nhlt").unwrap();
    assert_eq!(assembly.bytes, [0x10, 0x12, 0x34, 0x02, 0xFF]);
}

#[test]
fn expression_value() {
    check("mov [$1 + $2 * $3], r1", expect!["10 00 07 02"]);
    check("mov [$1 - $2], r1", expect!["10 FF FF 02"]);
}

#[test]
fn register_operands() {
    check(
        "mov &r1, r2\nmov $0004, &fp, sp\nlsf r3, $10",
        expect!["1C 02 03 1D 00 04 0B 0A 26 04 10"],
    );
}

#[test]
fn forward_label() {
    check(
        "    jeq $0000, &[!end]
    mov $0001, r1
end:
    hlt",
        expect!["41 00 00 00 09 10 00 01 02 FF"],
    );
}

#[test]
fn data_layout() {
    check(
        "data8 bytes = { $01, $1FF }\ndata16 words = { $1234 }\nmov !words, r1",
        expect!["01 FF 12 34 10 00 02 02"],
    );
}

#[test]
fn constants_take_no_space() {
    check(
        "constant base = $3000\nmov $41, &[!base + $2]",
        expect!["1B 00 41 30 02"],
    );
}

#[test]
fn structure_member() {
    check(
        "structure Rect { x: $02, y: $02, w: $02 }
data16 shape = { $0, $0, $0 }
mov <Rect> shape.w, r1",
        expect!["00 00 00 00 00 00 10 00 04 02"],
    );
}

#[test]
fn image_matches_allocation() {
    let src = "start:\ndata8 a = { $1, $2, $3 }\nmov &r1, r2\ncal !start\nret\npsh $1\npop r8\n";
    let program = Parser::new(src).parse().unwrap();
    let mut assembler = Assembler::new(&program);
    let size = assembler.allocate().unwrap();
    let bytes = assembler.encode().unwrap();
    assert_eq!(size, 3 + 3 + 3 + 1 + 3 + 2);
    assert_eq!(bytes.len() as u32, size);
}

#[test]
fn duplicate_symbol() {
    check_error("a:\na:\nhlt", expect!["symbol `a` is defined more than once"]);
    check_error(
        "constant a = $1\na:",
        expect!["symbol `a` is defined more than once"],
    );
}

#[test]
fn duplicate_member() {
    check_error(
        "structure S { a: $1, a: $2 }",
        expect!["member `a` is declared more than once in structure `S`"],
    );
}

#[test]
fn unresolved_symbol() {
    check_error("mov !nowhere, r1", expect!["symbol `nowhere` wasn't resolved"]);
}

#[test]
fn member_errors() {
    check_error(
        "mov <Rect> here.x, r1\nhere:",
        expect!["structure `Rect` wasn't resolved"],
    );
    check_error(
        "structure Rect { x: $2 }\nmov <Rect> here.y, r1\nhere:",
        expect!["structure `Rect` has no member `y`"],
    );
    check_error(
        "here:\nmov <here> here.y, r1",
        expect!["`here` is not a structure"],
    );
    check_error(
        "structure Rect { x: $2 }\nmov !Rect, r1",
        expect!["structure `Rect` can't be used as a value"],
    );
}

#[test]
fn image_too_large() {
    let src = "mov $0, r1\n".repeat(0x4001);
    let err = assemble(&src).unwrap_err();
    assert!(matches!(err, AssembleError::ImageTooLarge(0x10004)));
}

#[test]
fn label_past_the_last_address() {
    let full = "mov $0, r1\n".repeat(0x4000);
    assert_eq!(assemble(&full).unwrap().bytes.len(), 0x10000);

    let err = assemble(&format!("{full}end:\n")).unwrap_err();
    assert!(matches!(err, AssembleError::ImageTooLarge(0x10000)));
    let err = assemble(&format!("{full}data8 tail = {{}}\n")).unwrap_err();
    assert!(matches!(err, AssembleError::ImageTooLarge(0x10000)));
}

#[test]
fn short_immediate_keeps_low_byte() {
    check("lsf r1, $1FF", expect!["26 02 FF"]);
}

#[test]
fn parse_error_is_forwarded() {
    check_error("mov r1", expect!["parse error: expected `,` at 1:7"]);
}

#[test]
fn exports_and_lookup() {
    let assembly = assemble(
        "+constant port = $3000
+data8 msg = { $48 }
structure S { a: $1 }
+structure T { b: $2 }
start:
    hlt",
    )
    .unwrap();
    assert_eq!(assembly.address_of("port"), Some(0x3000));
    assert_eq!(assembly.address_of("msg"), Some(0));
    assert_eq!(assembly.address_of("start"), Some(1));
    assert_eq!(assembly.address_of("S"), None);
    assert_eq!(assembly.address_of("missing"), None);

    let exports: Vec<_> = assembly
        .exports()
        .map(|(name, symbol)| match symbol {
            Symbol::Structure(s) => format!("{name} size {}", s.size()),
            other => format!("{name} {other:?}"),
        })
        .collect();
    expect![[r#"
        [
            "port Constant(12288)",
            "msg Address(0)",
            "T size 2",
        ]
    "#]]
    .assert_debug_eq(&exports);
}
