use podnote_store::{Backend, PodStore};
use std::path::Path;

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// `podnote status`
pub fn execute<B: Backend>(store: &mut PodStore<B>, root: &Path, json: bool) -> anyhow::Result<()> {
    let stats = store.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Data dir: {}", root.display());
    let u = &stats.usage;
    println!(
        "Storage: {} of {} ({:.0}%){}",
        format_size(u.used),
        format_size(u.ceiling),
        u.ratio * 100.0,
        if u.near_full { "  NEAR FULL: run `podnote gc`" } else { "" }
    );
    println!("History: {} item(s)", stats.history_count);
    println!(
        "Notes: {} across {} episode(s)",
        stats.notes_count, stats.episodes_with_notes
    );
    println!("Cached transcripts: {}", stats.transcripts_cached);
    println!(
        "Resume point: {}",
        if stats.has_last_played { "set" } else { "none" }
    );
    Ok(())
}
