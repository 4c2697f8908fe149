//! Command-line parsing.
//!
//! `mica [options] program.mrb [more.mrb ...]` - each bytecode file becomes
//! one task. No CLI framework: the option surface is four flags.

/// Parsed invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Args {
    /// Bytecode files, one task each, in creation order.
    pub files: Vec<String>,
    /// Memory pool size in bytes.
    pub pool_size: usize,
    /// Scheduler tick period in milliseconds; `None` runs self-ticked.
    pub tick_ms: Option<u64>,
    /// Print pool statistics after the run.
    pub stats: bool,
}

/// Parse failure with a user-facing message.
#[derive(Debug, PartialEq, Eq)]
pub struct UsageError(pub String);

pub const DEFAULT_POOL_SIZE: usize = 40 * 1024;

pub const USAGE: &str = "usage: mica [options] program.mrb [more.mrb ...]
options:
  --pool BYTES    memory pool size (default 40960)
  --tick MS       drive the scheduler from a timer thread
  --stats         print pool statistics after the run
  --help          this text";

impl Args {
    pub fn parse(argv: impl Iterator<Item = String>) -> Result<Args, UsageError> {
        let mut args = Args {
            files: Vec::new(),
            pool_size: DEFAULT_POOL_SIZE,
            tick_ms: None,
            stats: false,
        };
        let mut argv = argv.peekable();
        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--pool" => {
                    let v = argv
                        .next()
                        .ok_or_else(|| UsageError("--pool needs a byte count".into()))?;
                    args.pool_size = v
                        .parse()
                        .map_err(|_| UsageError(format!("bad pool size '{}'", v)))?;
                }
                "--tick" => {
                    let v = argv
                        .next()
                        .ok_or_else(|| UsageError("--tick needs milliseconds".into()))?;
                    args.tick_ms = Some(
                        v.parse()
                            .map_err(|_| UsageError(format!("bad tick period '{}'", v)))?,
                    );
                }
                "--stats" => args.stats = true,
                "--help" | "-h" => return Err(UsageError(USAGE.into())),
                other if other.starts_with('-') => {
                    return Err(UsageError(format!("unknown option '{}'", other)));
                }
                file => args.files.push(file.into()),
            }
        }
        if args.files.is_empty() {
            return Err(UsageError(USAGE.into()));
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(items: &[&str]) -> Result<Args, UsageError> {
        Args::parse(items.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let a = parse(&["main.mrb"]).unwrap();
        assert_eq!(a.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(a.tick_ms, None);
        assert!(!a.stats);
        assert_eq!(a.files, vec!["main.mrb".to_string()]);
    }

    #[test]
    fn options_and_files() {
        let a = parse(&["--pool", "8192", "--tick", "5", "a.mrb", "b.mrb"]).unwrap();
        assert_eq!(a.pool_size, 8192);
        assert_eq!(a.tick_ms, Some(5));
        assert_eq!(a.files.len(), 2);
    }

    #[test]
    fn missing_file_is_usage_error() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--stats"]).is_err());
    }

    #[test]
    fn unknown_option_rejected() {
        assert!(parse(&["--wat", "x.mrb"]).is_err());
    }
}
