//! Integration tests for the fconsole CLI.

use color_eyre as _;
use console_core as _;
use log as _;
use simple_logger as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fconsole"))
}

fn write_program(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run fconsole")
}

#[test]
fn halting_program_succeeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = write_program(temp_dir.path(), "halt.bin", &[0x00]);

    let output = run(&[program.to_str().unwrap(), "-m", "1024"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("halted after 1 instructions"), "{stdout}");
}

#[test]
fn dumps_are_written_before_and_after() {
    let temp_dir = tempfile::tempdir().unwrap();
    // mov $beef, &13; hlt
    let program = write_program(
        temp_dir.path(),
        "store.bin",
        &[0x14, 0xBE, 0xEF, 0x00, 0x13, 0x00],
    );
    let before = temp_dir.path().join("before.txt");
    let after = temp_dir.path().join("after.txt");

    let output = run(&[
        program.to_str().unwrap(),
        "--memory",
        "64",
        "--dump-start",
        before.to_str().unwrap(),
        "--dump-end",
        after.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let before = fs::read_to_string(before).unwrap();
    let after = fs::read_to_string(after).unwrap();
    assert_eq!(before.lines().count(), 4);
    assert!(before.starts_with("0x0000: "));
    // program memory starts at 0x1d with no devices, so the store lands on 0x30
    assert!(before.lines().nth(3).unwrap().starts_with("0x0030: 00 00"));
    assert!(after.lines().nth(3).unwrap().starts_with("0x0030: be ef"));
}

#[test]
fn listing_disassembles_from_the_program_start() {
    let temp_dir = tempfile::tempdir().unwrap();
    // mov $7, acu; nop; hlt
    let program = write_program(
        temp_dir.path(),
        "list.bin",
        &[0x10, 0x00, 0x07, 0x01, 0x01, 0x00],
    );

    let output = run(&[program.to_str().unwrap(), "-m", "1024", "--list", "3"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<&str> = stdout.lines().take(3).collect();
    assert_eq!(
        rows,
        vec!["0x001d: MOV_LIT_REG $ 00 07 01", "0x0021: NOP", "0x0022: HLT"]
    );
}

#[test]
fn faulting_program_fails_with_context() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = write_program(temp_dir.path(), "bad.bin", &[0x01, 0xF1]);

    let output = run(&[program.to_str().unwrap(), "-m", "1024"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown instruction"), "{stderr}");
    assert!(stderr.contains("acu"), "{stderr}");
}

#[test]
fn custom_instruction_table_remaps_opcodes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let table = temp_dir.path().join("table.csv");
    fs::write(
        &table,
        "tag,opcode,type,mnemonic\n\
         HLT,0x7F,noArgs,hlt\n\
         RET_INT,0x05,noArgs,rti\n\
         MOV_LIT_REG,0x10,litReg,mov\n\
         ADD_LIT_REG,0x21,litReg,add\n\
         MUL_LIT_REG,0x27,litReg,mul\n",
    )
    .unwrap();
    let program = write_program(temp_dir.path(), "halt.bin", &[0x7F]);

    let output = run(&[
        program.to_str().unwrap(),
        "-m",
        "1024",
        "-i",
        table.to_str().unwrap(),
    ]);

    assert!(output.status.success());
}

#[test]
fn missing_program_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("nothing.bin");

    let output = run(&[missing.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read program"), "{stderr}");
}

#[test]
fn unknown_option_prints_usage() {
    let output = run(&["game.bin", "--turbo"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage: fconsole"));
    assert!(stderr.contains("unknown option"));
}

#[test]
fn help_flag_prints_usage() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage: fconsole"));
}
