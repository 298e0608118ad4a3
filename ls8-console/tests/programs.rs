use cpu::Cpu;
use ls8_console::Console;
use std::path::Path;

/// Loads a program from the `programs/` directory and runs it to completion
fn run(name: &str) -> (Console<Vec<u8>>, Result<(), cpu::Error>) {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .expect("CARGO_MANIFEST_DIR not set");
    let path = Path::new(&manifest_dir)
        .parent()
        .expect("missing parent directory")
        .join(format!("programs/{name}.ls8"));
    let text =
        std::fs::read_to_string(&path).expect("could not open program file");

    let mut vm = Cpu::new();
    vm.load(&text).expect("failed to load program");
    let mut dev = Console::with_writer(vec![]);
    let r = vm.run(&mut dev);
    (dev, r)
}

fn run_and_check(name: &str, expected: &[u8]) {
    let (dev, r) = run(name);
    if let Err(e) = r {
        panic!("{name}: {e}");
    }
    assert_eq!(dev.exit_code(), Some(0), "{name}: missing exit request");

    let mut lines: Vec<String> =
        expected.iter().map(|v| v.to_string()).collect();
    lines.push(ls8_console::SHUTDOWN_MESSAGE.to_owned());
    let out = String::from_utf8(dev.into_writer()).expect("invalid UTF-8");
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        lines,
        "{name}: output mismatch"
    );
}

#[test]
fn print8() {
    run_and_check("print8", &[8]);
}

#[test]
fn mult() {
    run_and_check("mult", &[72]);
}

#[test]
fn and() {
    run_and_check("and", &[8]);
}

#[test]
fn stack() {
    run_and_check("stack", &[2, 4, 1]);
}

#[test]
fn call() {
    run_and_check("call", &[20, 30, 36, 60]);
}

#[test]
fn sctest() {
    run_and_check("sctest", &[1, 4, 5]);
}

#[test]
fn empty() {
    let (dev, r) = run("empty");
    assert_eq!(r, Err(cpu::Error::UnknownOpcode { opcode: 0, pc: 0 }));
    assert_eq!(dev.exit_code(), None);
    assert!(dev.writer().is_empty());
}
