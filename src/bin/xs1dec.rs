use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use xs1dec::instruction::Mode;
use xs1dec::line::decode_line;

/// Decode XMOS XS1(b) instructions from hex or xobjdump output on stdin.
///
/// Example: xobjdump -d program.xe | xs1dec --xobjdump-sub
#[derive(Parser, Debug)]
#[command(name = "xs1dec", version)]
struct Args {
    /// Substitute non-architectural instructions in xobjdump output for
    /// architectural ones, e.g. ldw (ru6) becomes LDWSP_ru6
    #[arg(long, conflicts_with_all = ["xobjdump_merge", "default"])]
    xobjdump_sub: bool,

    /// Append the architectural instruction to the end of each line,
    /// after SEP
    #[arg(long, value_name = "SEP", conflicts_with = "default")]
    xobjdump_merge: Option<String>,

    /// Output only the instructions found (the default)
    #[arg(long)]
    default: bool,

    /// Rendering mode by name: default, substitute, merge or merge=SEP
    #[arg(short, long, value_name = "MODE",
          conflicts_with_all = ["xobjdump_sub", "xobjdump_merge", "default"])]
    mode: Option<Mode>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn rendering(&self) -> Mode {
        if let Some(ref mode) = self.mode {
            mode.clone()
        } else if self.default {
            Mode::Default
        } else if self.xobjdump_sub {
            Mode::Substitute
        } else if let Some(ref sep) = self.xobjdump_merge {
            Mode::Merge(sep.clone())
        } else {
            Mode::Default
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    let mode = args.rendering();
    debug!("rendering mode {:?}", mode);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (n, line) in stdin.lock().lines().enumerate() {
        let line = line.with_context(|| format!("reading line {} of input", n + 1))?;
        if let Some(text) = decode_line(&line, &mode) {
            writeln!(out, "{}", text).context("writing output")?;
        }
    }

    Ok(())
}

#[cfg(test)]
fn rendering(argv: &[&str]) -> Option<Mode> {
    Args::try_parse_from(argv).ok().map(|a| a.rendering())
}

#[test]
fn test_rendering_flags() {
    assert_eq!(rendering(&["xs1dec"]), Some(Mode::Default));
    assert_eq!(rendering(&["xs1dec", "--xobjdump-sub"]), Some(Mode::Substitute));
    assert_eq!(rendering(&["xs1dec", "--xobjdump-merge", " # "]), Some(Mode::Merge(" # ".to_string())));
    assert_eq!(rendering(&["xs1dec", "--mode", "sub"]), Some(Mode::Substitute));
    assert_eq!(rendering(&["xs1dec", "-m", "merge=//"]), Some(Mode::Merge("//".to_string())));
    assert_eq!(rendering(&["xs1dec", "--mode", "replace"]), None);
    assert_eq!(rendering(&["xs1dec", "--mode", "sub", "--default"]), None);
}
