use anyhow::Context;
use podnote_core::{Backup, SnapshotInfo, BACKUP_MIME};
use podnote_store::{export_as_text, import_from_text, Backend, PodStore};
use std::path::{Path, PathBuf};

fn read_backup(file: &Path) -> anyhow::Result<Backup> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    Ok(import_from_text(&text)?)
}

fn print_info(info: &SnapshotInfo) {
    println!("Version:     {}", info.version);
    println!("Date:        {}", info.date);
    println!("History:     {} item(s)", info.history_count);
    println!("Notes:       {} note(s)", info.notes_count);
    println!(
        "Last played: {}",
        if info.has_last_played { "yes" } else { "no" }
    );
}

/// `podnote backup export [--out FILE] [--stdout]`
pub fn export<B: Backend>(
    store: &mut PodStore<B>,
    out: Option<&Path>,
    stdout: bool,
) -> anyhow::Result<()> {
    let backup = store.backups().create_snapshot()?;
    let text = export_as_text(&backup)?;
    if stdout {
        println!("{text}");
        return Ok(());
    }
    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(backup.file_name()));
    podnote_store::write_atomic(&path, text.as_bytes())
        .with_context(|| format!("cannot write {}", path.display()))?;
    let info = backup.info();
    println!(
        "Exported {} history item(s), {} note(s) to {} ({BACKUP_MIME})",
        info.history_count,
        info.notes_count,
        path.display()
    );
    Ok(())
}

/// `podnote backup info <FILE>`
pub fn info(file: &Path) -> anyhow::Result<()> {
    let backup = read_backup(file)?;
    print_info(&backup.info());
    Ok(())
}

/// `podnote backup restore <FILE> [--force]`
pub fn restore<B: Backend>(store: &mut PodStore<B>, file: &Path, force: bool) -> anyhow::Result<()> {
    let backup = read_backup(file)?;
    let info = store.backups().info(&backup);
    print_info(&info);
    if !force {
        println!();
        println!("Restoring replaces all notes and merges history. Re-run with --force to continue.");
        return Ok(());
    }
    store.backups().restore(&backup)?;
    println!("Restored from {}", file.display());
    Ok(())
}
