use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use colored::*;
use eefs::fsck::{run_fsck, MediumBackend};
use eefs::config::parse_u32;
use eefs::FileMedium;

const USAGE: &str = "Usage: fsck.eefs <image> [base]";

fn section(title: &str, ok: bool, good: &str, bad: &str) {
    println!("\n{}", title.bold().underline());
    if ok {
        println!("  {} {}", "✓".green(), good);
    } else {
        println!("  {} {}", "✗".red(), bad);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let image = args.next().map(PathBuf::from).context(USAGE)?;
    let base = match args.next() {
        Some(base) => parse_u32(&base).with_context(|| format!("bad base address '{base}'"))?,
        None => 0,
    };

    // ——————————————————————————————————————————
    //       RUN THE CHECK
    // ——————————————————————————————————————————
    let medium = FileMedium::open_read_only(&image)
        .with_context(|| format!("Could not open image {:?}", image))?;
    let rep = run_fsck(&MediumBackend::new(&medium, base));

    println!("\n{}", " EEFS FILESYSTEM CHECK ".on_blue().bold());
    println!("{}", "──────────────────────────────────────────".blue());

    section("Volume header", rep.header_ok, "Header OK", "Header errors");
    section(
        "Allocation table",
        rep.allocation_ok,
        "Allocation table OK",
        "Allocation table errors",
    );
    section("Files", rep.files_ok, "File headers OK", "File header errors");
    println!(
        "  {} in use, {} removed",
        rep.files_in_use.to_string().cyan(),
        rep.tombstones.to_string().cyan()
    );

    // ——————————————————————————————————————————
    //       DETAILED ERRORS
    // ——————————————————————————————————————————
    println!("\n{}", "Errors found".bold().underline());

    if rep.errors.is_empty() {
        println!("  {} No errors found", "✓".green());
    } else {
        for err in &rep.errors {
            println!("  {} {}", "•".red(), err.red());
        }
    }

    // ——————————————————————————————————————————
    //       SUMMARY
    // ——————————————————————————————————————————
    println!("\n{}", "Summary".bold().underline());

    if rep.is_clean() {
        println!("{} Filesystem is clean.\n", "✓ OK".green().bold());
        Ok(())
    } else {
        println!(
            "{} {} errors found.\n",
            "✗ FSCK finished with errors:".red().bold(),
            rep.errors.len().to_string().yellow()
        );
        process::exit(1);
    }
}
