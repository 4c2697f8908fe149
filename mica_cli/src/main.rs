//! Command-line host for the mica VM.
//!
//! Loads each bytecode file as one task, runs the scheduler to completion
//! and maps the VM error word onto the process exit code.

mod args;

use args::{Args, UsageError};
use mica_vm::Interp;
use std::process::ExitCode;
use std::time::Duration;

/// Every task halted cleanly.
const EXIT_SUCCESS: u8 = 0;
/// A VM died with a nonzero error word.
const EXIT_VM_ERROR: u8 = 1;
/// Bad invocation or unreadable input.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(UsageError(msg)) => {
            eprintln!("{}", msg);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut interp = Interp::new(args.pool_size);

    for path in &args.files {
        let bytecode = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("mica: cannot read {}: {}", path, e);
                return ExitCode::from(EXIT_USAGE);
            }
        };
        if let Err(e) = interp.create_task(&bytecode, 0) {
            eprintln!("mica: {}: {}", path, e);
            return ExitCode::from(EXIT_USAGE);
        }
    }

    if let Some(ms) = args.tick_ms {
        interp.start_ticker(Duration::from_millis(ms));
    }

    let error_word = interp.run();

    if args.stats {
        let s = interp.statistics();
        eprintln!(
            "pool total:{} used:{} free:{} fragment:{}",
            s.total, s.used, s.free, s.fragment
        );
    }

    if error_word == 0 {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!("mica: VM terminated with error {}", error_word);
        ExitCode::from(EXIT_VM_ERROR)
    }
}
