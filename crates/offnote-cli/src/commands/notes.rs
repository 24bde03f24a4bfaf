use std::io::{self, IsTerminal, Read};

use offnote_core::Note;
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::NotesCommand;
use crate::output::{note_json, notes_table, print_json, print_note};

pub fn handle_notes(ctx: &AppContext, command: &NotesCommand) -> anyhow::Result<()> {
    match command {
        NotesCommand::List { json } => handle_list(ctx, *json),
        NotesCommand::Add {
            title,
            content,
            id,
            tag,
        } => handle_add(ctx, title, content.as_deref(), id.as_deref(), tag),
        NotesCommand::Show { id, json } => handle_show(ctx, id, *json),
        NotesCommand::Delete { id } => handle_delete(ctx, id),
        NotesCommand::LastSync { json } => handle_last_sync(ctx, *json),
        NotesCommand::Forget => handle_forget(ctx),
    }
}

fn handle_list(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let notes = ctx.open_mirror()?.load_notes(&user)?;

    if json {
        let values = notes.iter().map(note_json).collect::<anyhow::Result<Vec<_>>>()?;
        return print_json(&serde_json::Value::Array(values));
    }
    if notes.is_empty() {
        if !ctx.quiet() {
            println!("No notes mirrored for {}", user);
        }
        return Ok(());
    }
    println!("{}", notes_table(&notes));
    Ok(())
}

fn read_content(content: Option<&str>) -> anyhow::Result<String> {
    if let Some(content) = content {
        return Ok(content.to_string());
    }
    if io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to read note content from stdin: {}", e))?;
    Ok(buffer.trim_end().to_string())
}

fn handle_add(
    ctx: &AppContext,
    title: &str,
    content: Option<&str>,
    id: Option<&str>,
    tags: &[String],
) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let mirror = ctx.open_mirror()?;
    let content = read_content(content)?;

    let note = match id {
        Some(id) => match mirror.get_note(id, &user)? {
            Some(mut existing) => {
                existing.edit(title, content);
                if !tags.is_empty() {
                    existing.tags = tags.to_vec();
                }
                existing
            }
            None => Note::new(id, title, content).with_tags(tags.to_vec()),
        },
        None => Note::new(Uuid::new_v4().to_string(), title, content).with_tags(tags.to_vec()),
    };

    mirror.save_note(&note, &user)?;
    if !ctx.quiet() {
        println!("Saved note {}", note.id);
    }
    Ok(())
}

fn handle_show(ctx: &AppContext, id: &str, json: bool) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let note = ctx
        .open_mirror()?
        .get_note(id, &user)?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Note not found: {}\n\nHint: Run `offnote notes list` to find note IDs.",
                id
            )
        })?;

    if json {
        return print_json(&note_json(&note)?);
    }
    print_note(&note, ctx.quiet());
    Ok(())
}

fn handle_delete(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let mirror = ctx.open_mirror()?;
    if mirror.get_note(id, &user)?.is_none() {
        return Err(anyhow::anyhow!("Note not found: {}", id));
    }
    mirror.delete_note(id, &user)?;
    if !ctx.quiet() {
        println!("Deleted note {}", id);
    }
    Ok(())
}

fn handle_last_sync(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let last = ctx.open_mirror()?.last_sync_time(&user)?;
    let never = last.timestamp_millis() == 0;

    if json {
        return print_json(&serde_json::json!({
            "user": user,
            "lastSync": last,
            "never": never,
        }));
    }
    if never {
        println!("never");
    } else {
        println!("{}", last.to_rfc3339());
    }
    Ok(())
}

fn handle_forget(ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    ctx.open_mirror()?.clear_user_data(&user)?;
    if !ctx.quiet() {
        println!("Erased local notes and key for {}", user);
    }
    Ok(())
}
