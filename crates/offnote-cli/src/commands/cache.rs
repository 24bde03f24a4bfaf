use std::future::Future;
use std::io::Write;

use http::Method;
use offnote_core::cache::{
    ClientCommand, InstallOutcome, MessageOutcome, Registration, Request, ServedFrom,
};
use tracing::debug;

use crate::app::AppContext;
use crate::cli::CacheCommand;
use crate::output::print_json;

/// Run `work` on a single-threaded runtime after resuming the persisted
/// generation. Every CLI invocation is a fresh page session.
fn with_registration<F, Fut, T>(ctx: &AppContext, work: F) -> anyhow::Result<T>
where
    F: FnOnce(Registration) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let registration = ctx.open_registration()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        if let Some(report) = registration.resume().await? {
            debug!(generation = %report.generation, purged = ?report.purged, "resumed cache");
        }
        work(registration).await
    })
}

pub fn handle_cache(ctx: &AppContext, command: &CacheCommand) -> anyhow::Result<()> {
    match command {
        CacheCommand::Install => handle_install(ctx),
        CacheCommand::Fetch {
            url,
            document,
            method,
            body,
        } => handle_fetch(ctx, url, *document, method, *body),
        CacheCommand::Generations { json } => handle_generations(ctx, *json),
        CacheCommand::Clear => handle_message(ctx, ClientCommand::ClearCache),
        CacheCommand::Message { message } => handle_message(ctx, ClientCommand::parse(message)?),
    }
}

fn handle_install(ctx: &AppContext) -> anyhow::Result<()> {
    let outcome = with_registration(ctx, |registration| async move {
        Ok(registration.install().await?)
    })?;
    if ctx.quiet() {
        return Ok(());
    }
    match outcome {
        InstallOutcome::Activated(report) => {
            println!("Activated {}", report.generation);
            if !report.purged.is_empty() {
                println!("Removed {}", report.purged.join(", "));
            }
        }
        InstallOutcome::Waiting { generation } => {
            println!("Installed {} (waiting; takes over on next start)", generation);
        }
    }
    Ok(())
}

fn source_label(source: ServedFrom) -> &'static str {
    match source {
        ServedFrom::Network => "network",
        ServedFrom::Cache => "cache",
        ServedFrom::Synthesized => "offline",
    }
}

fn handle_fetch(
    ctx: &AppContext,
    url: &str,
    document: bool,
    method: &str,
    show_body: bool,
) -> anyhow::Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid HTTP method \"{}\": {}", method, e))?;
    let request = if document {
        Request::navigate(url)
    } else {
        Request::get(url)
    }
    .with_method(method);

    let served = with_registration(ctx, |registration| async move {
        Ok(registration.fetch(&request).await?)
    })?;

    if !ctx.quiet() {
        println!(
            "{} {} ({} bytes)",
            served.response.status,
            source_label(served.source),
            served.response.body.len()
        );
    }
    if show_body {
        std::io::stdout().write_all(&served.response.body)?;
    }
    Ok(())
}

fn handle_generations(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let generations = with_registration(ctx, |registration| async move {
        Ok(registration.generations().await?)
    })?;

    if json {
        return print_json(&serde_json::json!(generations));
    }
    if generations.is_empty() && !ctx.quiet() {
        println!("No cache generations");
    }
    for generation in generations {
        println!("{}", generation);
    }
    Ok(())
}

fn handle_message(ctx: &AppContext, command: ClientCommand) -> anyhow::Result<()> {
    let outcome = with_registration(ctx, |registration| async move {
        Ok(registration.message(command).await?)
    })?;
    if ctx.quiet() {
        return Ok(());
    }
    match outcome {
        MessageOutcome::Activated(report) => println!("Activated {}", report.generation),
        MessageOutcome::NothingWaiting => println!("No cache generation is waiting"),
        MessageOutcome::Cleared(cleared) => {
            println!("Cleared {} cache generation(s)", cleared.len());
        }
    }
    Ok(())
}
