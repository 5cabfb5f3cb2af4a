// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Boolean switch
fn flag(id: &'static str, short: Option<char>, long: &'static str, help: &'static str) -> Arg {
    let arg = Arg::new(id).long(long).action(ArgAction::SetTrue).help(help);
    match short {
        Some(c) => arg.short(c),
        None => arg,
    }
}

fn build_cli() -> Command {
    Command::new("apkpatch")
        .version(env!("CARGO_PKG_VERSION"))
        .author("apkpatch Contributors")
        .about("Build, patch, sign and install a modded APK")
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .default_value("config.toml")
                .help("Path to the configuration file"),
        )
        .arg(flag(
            "quick",
            Some('q'),
            "quick",
            "Quick rebuild: only reassemble the mod unit into the last compiled APK",
        ))
        .arg(flag(
            "keep",
            Some('k'),
            "keep",
            "Keep debug info (line numbers, locals) in decompiled smali",
        ))
        .arg(flag("verbose", Some('v'), "verbose", "Verbose logging"))
        .arg(flag(
            "patch",
            None,
            "patch",
            "Regenerate the patch directory from the decompiled stock APK",
        ))
        .arg(flag("yes", Some('y'), "yes", "Answer yes to download prompts"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("apkpatch.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
