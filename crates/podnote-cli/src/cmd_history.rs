use podnote_core::{clock, HistoryItem, HistoryPatch};
use podnote_store::{Backend, PodStore};

/// `h:mm:ss` above an hour, `m:ss` below.
pub(crate) fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// `podnote history list`
pub fn list<B: Backend>(store: &mut PodStore<B>, json: bool) -> anyhow::Result<()> {
    let items = store.history().load_all()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("(no history)");
        return Ok(());
    }
    for item in &items {
        let position = if item.duration_ms > 0 {
            format!(
                "{} / {}",
                format_ms(item.last_position_ms),
                format_ms(item.duration_ms)
            )
        } else {
            format_ms(item.last_position_ms)
        };
        println!(
            "{}  {} · {}  [{}]  {}",
            item.id, item.title, item.show_name, position, item.last_played_at
        );
    }
    Ok(())
}

/// `podnote history add`
///
/// Re-adding an episode keeps its cached notes, transcript and position.
pub fn add<B: Backend>(
    store: &mut PodStore<B>,
    id: &str,
    title: &str,
    show: &str,
    duration_ms: Option<u64>,
    cover: Option<String>,
) -> anyhow::Result<()> {
    let mut item = store
        .history()
        .get(id)?
        .unwrap_or_else(|| HistoryItem::new(id, title, show));
    item.title = title.to_string();
    item.show_name = show.to_string();
    if let Some(d) = duration_ms {
        item.duration_ms = d;
    }
    if cover.is_some() {
        item.cover_image = cover;
    }
    item.last_played_at = clock::now_rfc3339();
    store.history().add(item)?;
    println!("Added {id}");
    Ok(())
}

/// `podnote history update <id> --patch JSON`
pub fn update<B: Backend>(store: &mut PodStore<B>, id: &str, patch: &str) -> anyhow::Result<()> {
    let patch = HistoryPatch::from_json(patch)?;
    if !store.history().update(id, patch)? {
        anyhow::bail!("no history item {id}");
    }
    println!("Updated {id}");
    Ok(())
}

/// `podnote history delete <id>`
pub fn delete<B: Backend>(store: &mut PodStore<B>, id: &str) -> anyhow::Result<()> {
    if !store.history().delete(id)? {
        anyhow::bail!("no history item {id}");
    }
    println!("Deleted {id}");
    Ok(())
}

/// `podnote history clear`
pub fn clear<B: Backend>(store: &mut PodStore<B>) -> anyhow::Result<()> {
    let n = store.history().len()?;
    store.history().clear()?;
    println!("Cleared {n} history item(s)");
    Ok(())
}
