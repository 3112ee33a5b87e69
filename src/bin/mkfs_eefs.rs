// src/bin/mkfs_eefs.rs
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use eefs::codec::ALLOCATION_TABLE_SIZE;
use eefs::config::parse_u32;
use eefs::{format, FileMedium};

const USAGE: &str = "Usage: mkfs.eefs <image> <size> [base]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Arguments: image path, volume size, optional base address
    let mut args = env::args().skip(1);
    let image = args.next().map(PathBuf::from).context(USAGE)?;
    let size = args.next().context(USAGE)?;
    let size = parse_u32(&size).with_context(|| format!("bad volume size '{size}'"))?;
    let base = match args.next() {
        Some(base) => parse_u32(&base).with_context(|| format!("bad base address '{base}'"))?,
        None => 0,
    };

    if args.next().is_some() {
        return Err(anyhow!("{USAGE} (too many arguments)"));
    }
    if (size as usize) < ALLOCATION_TABLE_SIZE {
        return Err(anyhow!(
            "a volume needs at least {ALLOCATION_TABLE_SIZE} bytes, got {size}"
        ));
    }
    let total = base
        .checked_add(size)
        .context("base + size does not fit in 32 bits")?;

    // 2. Zero-filled image large enough for the volume
    let mut medium = FileMedium::create(&image, total)
        .with_context(|| format!("Could not create image {:?}", image))?;

    // 3. Header and empty allocation table
    let header = format(&mut medium, base, size).context("Format failed")?;
    medium.sync().context("Could not flush image")?;

    println!("Formatted {:?}", image);
    println!("  base address : {:#x}", base);
    println!("  volume size  : {} bytes", size);
    println!("  free space   : {} bytes", header.free_memory_size);
    Ok(())
}
