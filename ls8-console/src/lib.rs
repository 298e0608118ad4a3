//! Console device for the LS-8
//!
//! `PRN` values are written to an output stream as soon as they are printed.
//! `HLT` writes a shutdown message and records an exit request; the process
//! only ends when the driver calls [`Console::check`].
#![warn(missing_docs)]
use cpu::{Cpu, Device};
use log::warn;
use std::io::Write;

/// Message written when the CPU executes `HLT`
pub const SHUTDOWN_MESSAGE: &str = "Shutting Down... Goodbye";

/// Handle to the console
pub struct Console<W: Write = std::io::Stdout> {
    out: W,

    /// Exit code requested by `HLT`
    exit: Option<i32>,

    /// First write error, reported by [`Console::check`]
    error: Option<std::io::Error>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Builds a console which writes to `stdout`
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl<W: Write> Console<W> {
    /// Builds a console which writes to the given stream
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            exit: None,
            error: None,
        }
    }

    /// Writes a line, returning `false` if the stream has failed
    fn write_line(&mut self, line: std::fmt::Arguments) -> bool {
        if self.error.is_some() {
            return false;
        }
        match writeln!(self.out, "{line}") {
            Ok(()) => true,
            Err(e) => {
                warn!("console write failed: {e}");
                self.error = Some(e);
                false
            }
        }
    }

    /// Returns the exit code requested by the VM, if any
    pub fn exit_code(&self) -> Option<i32> {
        self.exit
    }

    /// Shared borrow of the output stream
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Unwraps the console, returning the output stream
    pub fn into_writer(self) -> W {
        self.out
    }

    /// Checks the results
    ///
    /// The output stream is flushed, and `exit(..)` is called if it has been
    /// requested by the VM.  Write errors seen while the VM was running are
    /// returned here.
    pub fn check(&mut self) -> std::io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        if let Some(e) = self.exit {
            std::process::exit(e);
        }
        Ok(())
    }
}

impl<W: Write> Device for Console<W> {
    fn print(&mut self, _vm: &Cpu, value: u8) -> bool {
        self.write_line(format_args!("{value}"))
    }

    fn halt(&mut self, _vm: &Cpu) {
        self.write_line(format_args!("{SHUTDOWN_MESSAGE}"));
        self.exit = Some(0);
    }
}
