use std::io::IsTerminal;
use std::path::Path;

use dialoguer::Password;
use offnote_core::backup::{read_backup, write_backup};
use offnote_core::Note;

use crate::app::AppContext;
use crate::cli::BackupCommand;

/// Read the backup passphrase from OFFNOTE_PASSPHRASE or prompt for it.
fn prompt_passphrase(confirm: bool) -> anyhow::Result<String> {
    if let Ok(value) = std::env::var("OFFNOTE_PASSPHRASE") {
        if !value.trim().is_empty() {
            return Ok(value);
        }
    }
    if !std::io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set OFFNOTE_PASSPHRASE."
        ));
    }
    let mut prompt = Password::new().with_prompt("Backup passphrase");
    if confirm {
        prompt = prompt.with_confirmation("Confirm passphrase", "Passphrases do not match");
    }
    prompt
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

pub fn handle_backup(ctx: &AppContext, command: &BackupCommand) -> anyhow::Result<()> {
    match command {
        BackupCommand::Export { destination } => handle_export(ctx, Path::new(destination)),
        BackupCommand::Import { source, replace } => {
            handle_import(ctx, Path::new(source), *replace)
        }
    }
}

fn handle_export(ctx: &AppContext, destination: &Path) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let notes = ctx.open_mirror()?.load_notes(&user)?;
    let passphrase = prompt_passphrase(true)?;

    write_backup(destination, &notes, &passphrase)?;
    if !ctx.quiet() {
        println!("Exported {} note(s) to {}", notes.len(), destination.display());
    }
    Ok(())
}

/// Imported notes win over local ones with the same ID.
fn merge(local: Vec<Note>, imported: Vec<Note>) -> Vec<Note> {
    let mut merged = imported;
    for note in local {
        if !merged.iter().any(|existing| existing.id == note.id) {
            merged.push(note);
        }
    }
    merged
}

fn handle_import(ctx: &AppContext, source: &Path, replace: bool) -> anyhow::Result<()> {
    let user = ctx.user_id()?;
    let passphrase = prompt_passphrase(false)?;
    let imported = read_backup(source, &passphrase)?;
    let count = imported.len();

    let mirror = ctx.open_mirror()?;
    let notes = if replace {
        imported
    } else {
        merge(mirror.load_notes(&user)?, imported)
    };
    mirror.save_notes(&notes, &user)?;

    if !ctx.quiet() {
        println!("Imported {} note(s); {} now mirrored", count, notes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_imported() {
        let local = vec![Note::new("a", "Local A", ""), Note::new("b", "Local B", "")];
        let imported = vec![Note::new("a", "Backup A", "")];

        let merged = merge(local, imported);

        let titles: Vec<&str> = merged.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Backup A", "Local B"]);
    }
}
