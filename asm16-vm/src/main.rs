use std::process::ExitCode;

use asm16::Register;
use asm16_vm::{Cpu, CpuConfig, Memory, MemoryMapper, Screen};
use tracing_subscriber::EnvFilter;

const SCREEN_START: u16 = 0x3000;
const SCREEN_END: u16 = 0x30FF;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let src = match read_in() {
        Ok(src) => src,
        Err(err) => {
            eprintln!("failed to read stdin: {err}");
            return ExitCode::FAILURE;
        }
    };
    let load_address = match load_address() {
        Ok(address) => address,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let assembly = match asm16::assemble(&src) {
        Ok(assembly) => assembly,
        Err(err) => {
            eprintln!("unable to assemble: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut memory = MemoryMapper::new();
    memory.map(Memory::shared(0x10000), 0x0000, 0xFFFF, true);
    memory.map(
        Screen::shared(std::io::stdout()),
        SCREEN_START,
        SCREEN_END,
        true,
    );
    if let Err(err) = memory.load(load_address, &assembly.bytes) {
        eprintln!("unable to load: {err}");
        return ExitCode::FAILURE;
    }
    let mut cpu = Cpu::new(memory, CpuConfig::default());
    cpu.set_reg(Register::Pc, load_address);

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(cpu.run()) {
        Ok(()) => {
            tracing::info!("\n{}", cpu.dump());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("machine fault: {err}\n{}", cpu.dump());
            ExitCode::FAILURE
        }
    }
}

/// `ASM16_LOAD_ADDRESS` in hex, `0` when unset. The image is assembled for
/// address 0, so only position independent programs run elsewhere.
fn load_address() -> Result<u16, String> {
    let Ok(value) = std::env::var("ASM16_LOAD_ADDRESS") else {
        return Ok(0);
    };
    let digits = value.trim().trim_start_matches("0x");
    u16::from_str_radix(digits, 16)
        .map_err(|err| format!("invalid ASM16_LOAD_ADDRESS `{value}`: {err}"))
}

fn read_in() -> std::io::Result<String> {
    use std::io::{stdin, Read};
    let mut out = String::new();
    stdin().read_to_string(&mut out)?;
    Ok(out)
}
