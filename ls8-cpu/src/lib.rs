//! LS-8 virtual machine
//!
//! The LS-8 is an 8-bit register machine with 256 bytes of memory, eight
//! general-purpose registers, and a downward-growing stack.  Each instruction
//! byte describes how it is decoded:
//!
//! ```text
//! AABCDDDD
//! ││││└┴┴┴─ instruction identifier
//! │││└────── sets PC (the run loop does not advance it)
//! ││└─────── executed by the ALU
//! └┴──────── number of operand bytes
//! ```
//!
//! Register indices, addresses, and the stack pointer are all bytes, and
//! arithmetic on them wraps.  Programs which walk off the end of memory or
//! use register indices above 7 are outside of the defined machine; the
//! interpreter does not panic on them, but makes no other promises.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use core::fmt;

mod opcode;
mod program;

pub use opcode::{Opcode, operand_count, sets_pc, uses_alu};
pub use program::LoadError;

/// Size of main memory, in bytes
pub const RAM_SIZE: usize = 256;

/// Number of registers
pub const REG_COUNT: usize = 8;

/// Register used as the stack pointer
pub const SP: u8 = 7;

/// Initial value of the stack pointer
pub const SP_INIT: u8 = 0xF4;

/// Condition flags, written by `CMP`
///
/// After a comparison, exactly one of [`Flags::LESS`], [`Flags::GREATER`],
/// or [`Flags::EQUAL`] is set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    /// The first register was less than the second
    pub const LESS: Flags = Flags(0b0100);
    /// The first register was greater than the second
    pub const GREATER: Flags = Flags(0b0010);
    /// The registers were equal
    pub const EQUAL: Flags = Flags(0b0001);

    /// Returns the raw flag bits
    #[inline]
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Checks whether the `EQUAL` bit is set
    #[inline]
    pub fn is_equal(&self) -> bool {
        self.0 & Flags::EQUAL.0 != 0
    }
}

/// Operations performed by the ALU
///
/// These operate on register indices, not values; the result is written back
/// into the first register (or into the flags, for [`AluOp::Cmp`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// `a += b`, wrapping
    Add,
    /// `a *= b`, wrapping
    Mul,
    /// Compares `a` to `b`, setting flags
    Cmp,
    /// `a &= b`
    And,
}

/// Fatal error raised while executing a program
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No handler exists for the instruction byte at `pc`
    UnknownOpcode {
        /// Instruction byte
        opcode: u8,
        /// Address of the instruction
        pc: u8,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownOpcode { opcode, pc } => {
                write!(f, "unknown opcode {opcode:#04x} at address {pc:#04x}")
            }
        }
    }
}

impl core::error::Error for Error {}

/// The virtual machine itself
#[derive(Clone, Debug)]
pub struct Cpu {
    /// 256 bytes of memory
    ram: [u8; RAM_SIZE],
    /// Register file; `R7` is the stack pointer
    reg: [u8; REG_COUNT],
    /// Address of the next instruction
    pc: u8,
    fl: Flags,
    running: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Masks a register operand into the register file
#[inline]
fn reg_index(i: u8) -> usize {
    usize::from(i & 0b111)
}

impl Cpu {
    /// Builds a new CPU with zeroed memory and an empty stack
    pub fn new() -> Self {
        let mut reg = [0u8; REG_COUNT];
        reg[usize::from(SP)] = SP_INIT;
        Self {
            ram: [0u8; RAM_SIZE],
            reg,
            pc: 0,
            fl: Flags::default(),
            running: false,
        }
    }

    /// Reads a byte from memory
    #[inline]
    pub fn ram_read(&self, addr: u8) -> u8 {
        self.ram[usize::from(addr)]
    }

    /// Writes a byte to memory
    #[inline]
    pub fn ram_write(&mut self, addr: u8, v: u8) {
        self.ram[usize::from(addr)] = v;
    }

    /// Shared borrow of the entire memory array
    #[inline]
    pub fn ram(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    /// Reads a register
    #[inline]
    pub fn reg(&self, i: u8) -> u8 {
        self.reg[reg_index(i)]
    }

    /// Writes a register
    #[inline]
    pub fn set_reg(&mut self, i: u8, v: u8) {
        self.reg[reg_index(i)] = v;
    }

    /// Returns the current stack pointer
    #[inline]
    pub fn sp(&self) -> u8 {
        self.reg(SP)
    }

    /// Returns the program counter
    #[inline]
    pub fn pc(&self) -> u8 {
        self.pc
    }

    /// Moves the program counter
    #[inline]
    pub fn set_pc(&mut self, pc: u8) {
        self.pc = pc;
    }

    /// Returns the current condition flags
    #[inline]
    pub fn flags(&self) -> Flags {
        self.fl
    }

    /// Checks whether the CPU is running (i.e. has not executed `HLT`)
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Performs an ALU operation on two registers
    pub fn alu(&mut self, op: AluOp, a: u8, b: u8) {
        let x = self.reg(a);
        let y = self.reg(b);
        match op {
            AluOp::Add => self.set_reg(a, x.wrapping_add(y)),
            AluOp::Mul => self.set_reg(a, x.wrapping_mul(y)),
            AluOp::And => self.set_reg(a, x & y),
            AluOp::Cmp => {
                self.fl = match x.cmp(&y) {
                    core::cmp::Ordering::Less => Flags::LESS,
                    core::cmp::Ordering::Greater => Flags::GREATER,
                    core::cmp::Ordering::Equal => Flags::EQUAL,
                }
            }
        }
    }

    /// Runs the CPU from the current `PC` until it halts
    pub fn run<D: Device>(&mut self, dev: &mut D) -> Result<(), Error> {
        self.run_with(dev, |_| ())
    }

    /// Runs the CPU until it halts, calling `hook` before every instruction
    pub fn run_with<D: Device, F: FnMut(&Cpu)>(
        &mut self,
        dev: &mut D,
        mut hook: F,
    ) -> Result<(), Error> {
        self.running = true;
        while self.running {
            hook(self);
            if let Err(e) = self.step(dev) {
                self.running = false;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Executes a single instruction at `PC`
    ///
    /// Both operand bytes are always fetched, even if the instruction uses
    /// fewer.  Unless the instruction sets `PC` itself, `PC` then advances
    /// past the opcode and its operands.
    pub fn step<D: Device>(&mut self, dev: &mut D) -> Result<(), Error> {
        let pc = self.pc;
        let ir = self.ram_read(pc);
        let a = self.ram_read(pc.wrapping_add(1));
        let b = self.ram_read(pc.wrapping_add(2));
        let Some(op) = Opcode::from_byte(ir) else {
            return Err(Error::UnknownOpcode { opcode: ir, pc });
        };
        self.op(op, dev, a, b);
        if !sets_pc(ir) {
            self.pc = self.pc.wrapping_add(operand_count(ir) + 1);
        }
        Ok(())
    }

    /// Executes a single operation
    #[inline]
    fn op<D: Device>(&mut self, op: Opcode, dev: &mut D, a: u8, b: u8) {
        match op {
            Opcode::Hlt => op::hlt(self, dev, a, b),
            Opcode::Ldi => op::ldi(self, dev, a, b),
            Opcode::Prn => op::prn(self, dev, a, b),
            Opcode::Add => op::add(self, dev, a, b),
            Opcode::Mul => op::mul(self, dev, a, b),
            Opcode::Cmp => op::cmp(self, dev, a, b),
            Opcode::And => op::and(self, dev, a, b),
            Opcode::Push => op::push(self, dev, a, b),
            Opcode::Pop => op::pop(self, dev, a, b),
            Opcode::Call => op::call(self, dev, a, b),
            Opcode::Ret => op::ret(self, dev, a, b),
            Opcode::Jmp => op::jmp(self, dev, a, b),
            Opcode::Jeq => op::jeq(self, dev, a, b),
            Opcode::Jne => op::jne(self, dev, a, b),
        }
    }

    /// Returns a printable snapshot of the CPU state
    ///
    /// ```text
    /// TRACE: PC | IR A  B  | R0 R1 R2 R3 R4 R5 R6 R7
    /// ```
    pub fn trace(&self) -> Trace<'_> {
        Trace(self)
    }
}

mod op {
    use super::*;

    /// Halt
    ///
    /// ```text
    /// HLT
    /// ```
    ///
    /// Stops the CPU.  The device is notified after the running flag is
    /// cleared, and is responsible for ending the process.
    #[inline]
    pub fn hlt(vm: &mut Cpu, dev: &mut dyn Device, _: u8, _: u8) {
        vm.running = false;
        dev.halt(vm);
    }

    /// Load Immediate
    ///
    /// ```text
    /// LDI register immediate
    /// ```
    #[inline]
    pub fn ldi(vm: &mut Cpu, _: &mut dyn Device, a: u8, b: u8) {
        vm.set_reg(a, b);
    }

    /// Print
    ///
    /// ```text
    /// PRN register
    /// ```
    ///
    /// Sends the register's value to the device, which prints it in decimal.
    /// If the device refuses the value, the CPU stops.
    #[inline]
    pub fn prn(vm: &mut Cpu, dev: &mut dyn Device, a: u8, _: u8) {
        let v = vm.reg(a);
        if !dev.print(vm, v) {
            vm.running = false;
        }
    }

    /// Add
    ///
    /// ```text
    /// ADD registerA registerB
    /// ```
    #[inline]
    pub fn add(vm: &mut Cpu, _: &mut dyn Device, a: u8, b: u8) {
        vm.alu(AluOp::Add, a, b);
    }

    /// Multiply
    ///
    /// ```text
    /// MUL registerA registerB
    /// ```
    #[inline]
    pub fn mul(vm: &mut Cpu, _: &mut dyn Device, a: u8, b: u8) {
        vm.alu(AluOp::Mul, a, b);
    }

    /// Compare
    ///
    /// ```text
    /// CMP registerA registerB
    /// ```
    #[inline]
    pub fn cmp(vm: &mut Cpu, _: &mut dyn Device, a: u8, b: u8) {
        vm.alu(AluOp::Cmp, a, b);
    }

    /// Bitwise And
    ///
    /// ```text
    /// AND registerA registerB
    /// ```
    #[inline]
    pub fn and(vm: &mut Cpu, _: &mut dyn Device, a: u8, b: u8) {
        vm.alu(AluOp::And, a, b);
    }

    /// Push
    ///
    /// ```text
    /// PUSH register
    /// ```
    ///
    /// Decrements `SP`, then copies the register to memory at `SP`.  Pushing
    /// `R7` therefore stores the already-decremented stack pointer.
    #[inline]
    pub fn push(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        let sp = vm.sp().wrapping_sub(1);
        vm.set_reg(SP, sp);
        let v = vm.reg(a);
        vm.ram_write(sp, v);
    }

    /// Pop
    ///
    /// ```text
    /// POP register
    /// ```
    ///
    /// Copies memory at `SP` into the register, then increments `SP`.
    #[inline]
    pub fn pop(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        let v = vm.ram_read(vm.sp());
        vm.set_reg(a, v);
        vm.set_reg(SP, vm.sp().wrapping_add(1));
    }

    /// Call
    ///
    /// ```text
    /// CALL register
    /// ```
    ///
    /// Pushes `PC+2` (the following instruction) onto the stack, then moves
    /// `PC` to the address stored in the register.
    #[inline]
    pub fn call(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        let next = vm.pc.wrapping_add(2);
        let sp = vm.sp().wrapping_sub(1);
        vm.set_reg(SP, sp);
        vm.ram_write(sp, next);
        vm.pc = vm.reg(a);
    }

    /// Return
    ///
    /// ```text
    /// RET
    /// ```
    ///
    /// Pops the return address from the stack into `PC`.
    #[inline]
    pub fn ret(vm: &mut Cpu, _: &mut dyn Device, _: u8, _: u8) {
        vm.pc = vm.ram_read(vm.sp());
        vm.set_reg(SP, vm.sp().wrapping_add(1));
    }

    /// Jump
    ///
    /// ```text
    /// JMP register
    /// ```
    #[inline]
    pub fn jmp(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        vm.pc = vm.reg(a);
    }

    /// Jump if Equal
    ///
    /// ```text
    /// JEQ register
    /// ```
    ///
    /// Jumps if the flags are exactly [`Flags::EQUAL`], otherwise moves to
    /// `PC+2`.
    #[inline]
    pub fn jeq(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        if vm.fl == Flags::EQUAL {
            vm.pc = vm.reg(a);
        } else {
            vm.pc = vm.pc.wrapping_add(2);
        }
    }

    /// Jump if Not Equal
    ///
    /// ```text
    /// JNE register
    /// ```
    ///
    /// Jumps if the `EQUAL` flag is clear, otherwise moves to `PC+2`.
    #[inline]
    pub fn jne(vm: &mut Cpu, _: &mut dyn Device, a: u8, _: u8) {
        if !vm.fl.is_equal() {
            vm.pc = vm.reg(a);
        } else {
            vm.pc = vm.pc.wrapping_add(2);
        }
    }
}

/// Trait for the console attached to the CPU
pub trait Device {
    /// Handles `PRN`, which prints `value` as a decimal integer
    ///
    /// Returns `true` if the CPU should keep running, `false` if it should
    /// stop.
    #[must_use]
    fn print(&mut self, vm: &Cpu, value: u8) -> bool;

    /// Handles `HLT`
    ///
    /// The CPU has already stopped by the time this is called.  The device
    /// should print its shutdown message and arrange for the process to end.
    fn halt(&mut self, vm: &Cpu);
}

/// Device which does nothing
pub struct EmptyDevice;
impl Device for EmptyDevice {
    fn print(&mut self, _vm: &Cpu, _value: u8) -> bool {
        // nothing to do here, keep running
        true
    }
    fn halt(&mut self, _vm: &Cpu) {
        // nothing to do here
    }
}

/// Printable snapshot of the CPU, returned by [`Cpu::trace`]
pub struct Trace<'a>(&'a Cpu);

impl fmt::Display for Trace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let vm = self.0;
        let pc = vm.pc;
        write!(
            f,
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            vm.ram_read(pc),
            vm.ram_read(pc.wrapping_add(1)),
            vm.ram_read(pc.wrapping_add(2)),
        )?;
        for r in vm.reg {
            write!(f, " {r:02X}")?;
        }
        Ok(())
    }
}
