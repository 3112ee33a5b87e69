// src/bin/mount_eefs.rs
use std::env;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use eefs::config::parse_u32;
use eefs::{Eefs, EefsFuse, FileMedium, MountOptions};

const USAGE: &str = "Usage: mount_eefs <image> <mountpoint> [base]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Arguments: mount_eefs image mountpoint [base]
    let mut args = env::args().skip(1);
    let image = args.next().map(PathBuf::from).context(USAGE)?;
    let mountpoint = args.next().map(PathBuf::from).context(USAGE)?;
    let base = match args.next() {
        Some(base) => parse_u32(&base).with_context(|| format!("bad base address '{base}'"))?,
        None => 0,
    };

    // 2. Open the image; a read-only image gives a write-protected volume
    let medium = FileMedium::open(&image)
        .with_context(|| format!("Could not open image {:?}", image))?;
    let options = MountOptions::default().with_write_protected(!medium.is_writable());
    let metadata = std::fs::metadata(&image)
        .with_context(|| format!("Could not stat image {:?}", image))?;

    // 3. Read the volume tables
    let fs = Eefs::mount(medium, base, options)
        .map_err(|(_, e)| e)
        .context("Error mounting EEFS volume")?;
    println!(
        "Mounted {:?}: {} files, {} bytes free",
        image,
        fs.volume().number_of_files(),
        fs.volume().free_memory_size
    );

    // 4. Serve it through FUSE until unmounted
    EefsFuse::new(fs)
        .with_owner(metadata.uid(), metadata.gid())
        .run(&mountpoint)
}
