use podnote_store::{Backend, EvictionReport, PodStore};

use crate::cmd_status::format_size;

fn print_ids(label: &str, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    println!("{label} ({}):", ids.len());
    for id in ids {
        println!("  {id}");
    }
}

fn print_report(report: &EvictionReport) {
    print_ids("History", &report.history_removed);
    print_ids("Transcripts", &report.transcripts_removed);
    print_ids("Notes", &report.notes_removed);
}

/// `podnote gc [--dry-run]`
pub fn execute<B: Backend>(store: &mut PodStore<B>, dry_run: bool) -> anyhow::Result<()> {
    let retention = store.config().retention_days;
    let report = if dry_run {
        store.plan_sweep()?
    } else {
        store.sweep()?
    };

    if report.is_empty() {
        println!("Nothing older than {retention} days; nothing to collect.");
        return Ok(());
    }
    print_report(&report);
    if dry_run {
        println!("Would free {}. (dry run)", format_size(report.bytes_freed));
    } else {
        println!("Freed {}.", format_size(report.bytes_freed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podnote_core::HistoryItem;
    use podnote_store::{MemoryBackend, StoreConfig};

    #[test]
    fn dry_run_keeps_everything() {
        let mut store = PodStore::new(MemoryBackend::new(), StoreConfig::default());
        let mut old = HistoryItem::new("old", "Old", "Show");
        old.last_played_at = "2001-01-01T00:00:00Z".into();
        store.history().add(old).unwrap();
        store.history().add(HistoryItem::new("new", "New", "Show")).unwrap();

        execute(&mut store, true).unwrap();
        assert_eq!(store.history().len().unwrap(), 2);
        execute(&mut store, false).unwrap();
        assert_eq!(store.history().len().unwrap(), 1);
    }
}
