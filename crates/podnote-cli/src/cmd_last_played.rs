use podnote_store::{Backend, PodStore};

use crate::cmd_history::format_ms;

/// `podnote last-played show`
pub fn show<B: Backend>(store: &mut PodStore<B>) -> anyhow::Result<()> {
    match store.last_played().load()? {
        Some(lp) => {
            let title = store
                .history()
                .get(&lp.episode_id)?
                .map(|item| format!(" ({})", item.title))
                .unwrap_or_default();
            println!("{}{} at {}", lp.episode_id, title, format_ms(lp.offset_ms));
        }
        None => println!("(nothing to resume)"),
    }
    Ok(())
}

/// `podnote last-played set <episode> <offset-ms>`
pub fn set<B: Backend>(store: &mut PodStore<B>, episode: &str, offset_ms: u64) -> anyhow::Result<()> {
    let lp = store.last_played().save(episode, offset_ms)?;
    println!("{} at {}", lp.episode_id, format_ms(lp.offset_ms));
    Ok(())
}

/// `podnote last-played clear`
pub fn clear<B: Backend>(store: &mut PodStore<B>) -> anyhow::Result<()> {
    store.last_played().clear()?;
    println!("Cleared");
    Ok(())
}
