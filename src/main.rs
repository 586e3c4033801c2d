//! Intel 4004 Emulator - CLI Entry Point
//!
//! Commands:
//! - `i4004-emu run <program>` - Run a hex, binary or ASM program
//! - `i4004-emu debug <program>` - Interactive debugger
//! - `i4004-emu asm <source>` - Assemble to a hex image
//! - `i4004-emu disasm <image>` - Disassemble an image

use clap::{Parser, Subcommand};
use i4004::{Machine, RomImage};
use std::io;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "i4004-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the Intel 4004 CPU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program for a bounded number of instructions
    Run {
        /// Path to the .hex, .asm or raw binary file to execute
        program: String,
        /// Load address for raw binaries
        #[arg(long, default_value = "0", value_parser = parse_address)]
        origin: u16,
        /// Start address (defaults to the image origin)
        #[arg(long, value_parser = parse_address)]
        entry: Option<u16>,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "10000")]
        max_instructions: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Stop on the first diagnostic (exit code 2)
        #[arg(long)]
        strict: bool,
        /// Write a JSON snapshot of the machine when done
        #[arg(long)]
        dump: Option<String>,
    },
    /// Interactive debugger
    Debug {
        /// Path to the program to debug
        program: String,
        /// Load address for raw binaries
        #[arg(long, default_value = "0", value_parser = parse_address)]
        origin: u16,
    },
    /// Assemble source to a hex image
    Asm {
        /// Path to the source file
        source: String,
        /// Output hex file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the .hex or raw binary file
        image: String,
        /// Load address for raw binaries
        #[arg(long, default_value = "0", value_parser = parse_address)]
        origin: u16,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let stderr_format = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(filter).with(stderr_format).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, origin, entry, max_instructions, trace, strict, dump }) => {
            run_program(&program, origin, entry, max_instructions, trace, strict, dump);
        }
        Some(Commands::Debug { program, origin }) => {
            debug_program(&program, origin);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image, origin }) => {
            disassemble_file(&image, origin);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("Intel 4004 Emulator v0.1.0");
            println!("A 4-bit MCS-4 CPU emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Parse a decimal or `0x` hex address.
fn parse_address(text: &str) -> Result<u16, String> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    }
    .map_err(|e| format!("invalid address '{}': {}", text, e))?;

    if usize::from(value) >= i4004::cpu::ADDRESS_SPACE {
        return Err(format!("address 0x{:X} is outside the 12-bit address space", value));
    }
    Ok(value)
}

/// Load a program by extension: `.asm` is assembled, `.hex` is parsed,
/// anything else is a raw binary at `origin`.
fn load_program(path: &str, origin: u16) -> RomImage {
    use i4004::asm::{assemble, load_binary, load_hex};

    let image = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(image) => {
                println!("📝 Assembled {} bytes at 0x{:03X}", image.len(), image.origin);
                image
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let loaded = if path.ends_with(".hex") {
            load_hex(path)
        } else {
            load_binary(path, origin)
        };

        match loaded {
            Ok(image) => {
                println!("📂 Loaded {} bytes at 0x{:03X}", image.len(), image.origin);
                image
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    };

    if image.is_empty() {
        eprintln!("❌ No program bytes to execute");
        std::process::exit(1);
    }

    image
}

fn run_program(
    path: &str,
    origin: u16,
    entry: Option<u16>,
    max_instructions: u64,
    trace: bool,
    strict: bool,
    dump: Option<String>,
) {
    println!("🔧 Running: {}", path);

    let image = load_program(path, origin);

    let mut machine = Machine::new();
    if let Err(e) = machine.load_image(&image) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    if let Some(entry) = entry {
        machine.set_entry(entry);
    }

    println!();
    println!("━━━ Execution ━━━");

    let mut executed = 0u64;
    let mut diagnostics = 0u64;
    let mut stopped = false;
    while executed < max_instructions {
        let (address, instr, diagnostic) = machine.step_instruction();
        executed += 1;

        if trace {
            let cpu = &machine.cpu;
            println!(
                "{:03X}: {:<16} ACC={:X} CY={} {:?}",
                address,
                instr.to_string(),
                cpu.accumulator(),
                u8::from(cpu.carry()),
                cpu.regs
            );
        }

        if let Some(diag) = diagnostic {
            diagnostics += 1;
            println!("⚠️  [{}] {}", diag.code(), diag);
            if strict {
                stopped = true;
                break;
            }
        }
    }

    let cpu = &machine.cpu;
    println!();
    println!("━━━ Result ━━━");
    println!("Instructions: {}", cpu.instructions_executed());
    println!("Cycles:       {}", cpu.cycles_executed());
    println!("Diagnostics:  {}", diagnostics);
    println!("PC:           0x{:03X}", cpu.pc());
    println!("ACC:          0x{:X} ({})", cpu.accumulator(), cpu.accumulator());
    println!("Carry:        {}", u8::from(cpu.carry()));
    println!("Registers:    {:?}", cpu.regs);
    println!("Stack:        {:03X?} (depth {})", cpu.stack.slots(), cpu.stack.depth());

    if let Some(path) = dump {
        let written = machine
            .snapshot()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("✓ Snapshot written to {}", path),
            Err(e) => {
                eprintln!("❌ Failed to write snapshot: {}", e);
                std::process::exit(1);
            }
        }
    }

    if stopped {
        eprintln!("❌ Stopped on diagnostic after {} instructions", executed);
        std::process::exit(2);
    }

    if executed >= max_instructions {
        println!();
        println!("⚠️  Reached instruction limit ({}). Use --max-instructions to change it.", max_instructions);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, origin: u16) {
    use i4004::tui::run_debugger;

    println!("🔍 Loading: {}", path);
    let image = load_program(path, origin);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(&image) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _origin: u16) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use i4004::asm::{assemble, save_hex};

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".hex"));

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let image = match assemble(&source) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes at 0x{:03X}", image.len(), image.origin);

    if let Err(e) = save_hex(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str, origin: u16) {
    use i4004::asm::{disassemble, load_binary, load_hex};

    println!("📖 Disassembling: {}", path);
    println!();

    let loaded = if path.ends_with(".hex") {
        load_hex(path)
    } else {
        load_binary(path, origin)
    };

    let image = match loaded {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&image.bytes, image.origin));
}

fn run_self_test() {
    use i4004::asm::assemble;
    use i4004::cpu::Instruction;

    println!("━━━ 4004 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: Addition program
    print!("LDM/XCH/ADD addition... ");
    let mut machine = Machine::new();
    let loaded = machine.load_image(&RomImage::new(0x200, vec![0xD5, 0xB1, 0xD3, 0x81, 0xB2]));
    machine.run(5, false);
    if loaded.is_ok() && machine.cpu.regs.get(2) == 8 && machine.cpu.accumulator() == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got R2={}, expected 8)", machine.cpu.regs.get(2));
        failed += 1;
    }

    // Test 2: Subroutine call and return
    print!("JMS/BBL round trip... ");
    let mut machine = Machine::new();
    let loaded = machine.load_image(&RomImage::new(0, vec![0x50, 0x10]));
    machine.rom.write(0x10, 0xC7);
    machine.run(2, false);
    if loaded.is_ok() && machine.cpu.pc() == 2 && machine.cpu.accumulator() == 7 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got PC=0x{:03X}, ACC={})", machine.cpu.pc(), machine.cpu.accumulator());
        failed += 1;
    }

    // Test 3: RAM write and read back
    print!("SRC/WRM/RDM... ");
    let mut machine = Machine::new();
    let loaded = machine.load_image(&RomImage::new(0, vec![0x20, 0x34, 0x21, 0xD9, 0xE0, 0xF0, 0xE9]));
    machine.run(6, false);
    if loaded.is_ok() && machine.cpu.accumulator() == 9 && machine.ram.peek(0, 3, 1) == 9 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got ACC={}, expected 9)", machine.cpu.accumulator());
        failed += 1;
    }

    // Test 4: Unknown opcode is reported and skipped
    print!("Unknown opcode diagnostic... ");
    let mut machine = Machine::new();
    let loaded = machine.load_image(&RomImage::new(0, vec![0xFF, 0xD3]));
    let summary = machine.run(2, false);
    if loaded.is_ok() && summary.diagnostics.len() == 1 && machine.cpu.accumulator() == 3 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ ({} diagnostics)", summary.diagnostics.len());
        failed += 1;
    }

    // Test 5: Assembler and decoder agree
    print!("Assembler round trip... ");
    match assemble("FIM P2, 0x5A\nJUN 0x3C1\nISZ R7, 0x20\nDCL") {
        Ok(image) => {
            let mut offset = 0;
            let mut decoded = Vec::new();
            while offset < image.bytes.len() {
                let (instr, len) = i4004::asm::disassemble_instruction(&image.bytes, offset);
                decoded.push(instr);
                offset += len;
            }
            let expected = vec![
                Instruction::Fim { pair: 2, data: 0x5A },
                Instruction::Jun { address: 0x3C1 },
                Instruction::Isz { register: 7, address: 0x20 },
                Instruction::Dcl,
            ];
            if decoded == expected {
                println!("✓");
                passed += 1;
            } else {
                println!("✗ (got {:?})", decoded);
                failed += 1;
            }
        }
        Err(e) => {
            println!("✗ ({})", e);
            failed += 1;
        }
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
