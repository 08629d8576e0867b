use anyhow::Context;
use podnote_core::{NoteCategory, NoteInput, NotePatch};
use podnote_store::{Backend, NoteFilter, NoteSortKey, PodStore, SortOrder};

use crate::cmd_history::format_ms;

pub struct AddArgs<'a> {
    pub text: String,
    pub quote: Option<String>,
    pub at_ms: u64,
    pub category: Option<&'a str>,
    pub tags: Vec<String>,
}

fn parse_category(s: &str) -> anyhow::Result<NoteCategory> {
    s.parse::<NoteCategory>()
        .with_context(|| format!("--category {s}"))
}

/// Turn `note list` flags into a filter.
pub fn build_filter(
    category: Option<&str>,
    tags: Vec<String>,
    search: Option<String>,
    sort: &str,
    asc: bool,
) -> anyhow::Result<NoteFilter> {
    Ok(NoteFilter {
        category: category.map(parse_category).transpose()?,
        tags,
        search,
        sort_by: sort.parse::<NoteSortKey>().map_err(anyhow::Error::msg)?,
        order: if asc { SortOrder::Asc } else { SortOrder::Desc },
    })
}

/// `podnote note add <episode>`
pub fn add<B: Backend>(store: &mut PodStore<B>, episode: &str, args: AddArgs<'_>) -> anyhow::Result<()> {
    let input = NoteInput {
        timestamp_ms: args.at_ms,
        quote: args.quote.unwrap_or_default(),
        text: args.text,
        tags: args.tags,
        category: args.category.map(parse_category).transpose()?,
    };
    let note = store.notes().add(episode, input)?;
    println!("{}", note.id);
    Ok(())
}

/// `podnote note list <episode>`
pub fn list<B: Backend>(
    store: &mut PodStore<B>,
    episode: &str,
    filter: &NoteFilter,
    json: bool,
) -> anyhow::Result<()> {
    let notes = store.notes().filter(episode, filter)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }
    if notes.is_empty() {
        println!("(no notes)");
        return Ok(());
    }
    for n in &notes {
        let tags = if n.tags.is_empty() {
            String::new()
        } else {
            format!("  #{}", n.tags.join(" #"))
        };
        println!("{}  [{}] @{}  {}{}", n.id, n.category, format_ms(n.timestamp_ms), n.text, tags);
        if !n.quote.is_empty() {
            println!("    > {}", n.quote);
        }
    }
    Ok(())
}

/// `podnote note edit <episode> <note-id> --patch JSON`
pub fn edit<B: Backend>(
    store: &mut PodStore<B>,
    episode: &str,
    note_id: &str,
    patch: &str,
) -> anyhow::Result<()> {
    let patch = NotePatch::from_json(patch)?;
    match store.notes().update(episode, note_id, patch)? {
        Some(note) => println!("Updated {} ({})", note.id, note.updated_at),
        None => anyhow::bail!("no note {note_id} on episode {episode}"),
    }
    Ok(())
}

/// `podnote note delete <episode> <note-id>`
pub fn delete<B: Backend>(store: &mut PodStore<B>, episode: &str, note_id: &str) -> anyhow::Result<()> {
    if !store.notes().delete(episode, note_id)? {
        anyhow::bail!("no note {note_id} on episode {episode}");
    }
    println!("Deleted {note_id}");
    Ok(())
}

/// `podnote note stats`
pub fn stats<B: Backend>(store: &mut PodStore<B>, json: bool) -> anyhow::Result<()> {
    let stats = store.notes().stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Notes: {}", stats.total);
    let c = &stats.by_category;
    println!(
        "  thought {}  question {}  action {}  quote {}",
        c.thought, c.question, c.action, c.quote
    );
    if !stats.recent.is_empty() {
        println!("Recent:");
        for n in &stats.recent {
            println!("  {}  {}  {}", n.created_at, n.episode_id, n.text);
        }
    }
    Ok(())
}
