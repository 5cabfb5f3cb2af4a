// src/cli.rs
//! CLI definitions for apkpatch
//!
//! The pipeline itself lives in the `pipeline` module; this only turns
//! arguments into run flags and answers download prompts.

use crate::config::{DEFAULT_CONFIG_FILE, RunFlags};
use crate::pipeline::{AssumeYes, Confirm};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "apkpatch")]
#[command(version)]
#[command(about = "Build, patch, sign and install a modded APK", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Quick rebuild: only reassemble the mod unit into the last compiled APK
    #[arg(short, long)]
    pub quick: bool,

    /// Keep debug info (line numbers, locals) in decompiled smali
    #[arg(short, long)]
    pub keep: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Regenerate the patch directory from the decompiled stock APK
    #[arg(long)]
    pub patch: bool,

    /// Answer yes to download prompts
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    pub fn to_flags(&self) -> RunFlags {
        RunFlags {
            quick: self.quick,
            keep_debug_info: self.keep,
            verbose: self.verbose,
            create_patches: self.patch,
            assume_yes: self.yes,
        }
    }

    /// Prompt answering strategy for this invocation
    pub fn confirm(&self) -> Box<dyn Confirm> {
        if self.yes {
            Box::new(AssumeYes)
        } else {
            Box::new(StdinConfirm)
        }
    }
}

/// Asks on stdout and reads one line from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        ask(prompt, &mut io::stdin().lock(), &mut io::stdout())
    }
}

/// Write `prompt`, then read one answer line from `input`
///
/// An unwritable prompt is only logged; an unreadable answer counts as no.
fn ask(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    if let Err(e) = writeln!(output, "{}", prompt).and_then(|()| output.flush()) {
        debug!("Failed to write prompt: {}", e);
    }

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(e) => {
            warn!("Failed to read answer: {}", e);
            false
        }
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
