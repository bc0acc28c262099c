use std::io::{self, Write};

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::browser::CollectionBrowser;
use crate::cli::{Command, TasksCommand};
use crate::context::AppContext;
use crate::filter::FilterMode;
use crate::remote::{HttpPostSource, PostSource};
use crate::render::Renderer;
use crate::task_store::{TaskEvent, TaskStore};

#[instrument(skip(ctx, renderer, command))]
pub fn dispatch(ctx: &AppContext, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");
    match command {
        Command::Page {
            filter,
            search,
            page,
        } => cmd_page(ctx, renderer, filter, search.as_deref(), page),
        Command::Tasks(tasks) => cmd_tasks(ctx, renderer, tasks),
        Command::Posts { search, page } => cmd_posts(ctx, renderer, search.as_deref(), page),
    }
}

#[instrument(skip(ctx, renderer))]
fn cmd_page(
    ctx: &AppContext,
    renderer: &Renderer,
    filter: FilterMode,
    search: Option<&str>,
    page: i64,
) -> anyhow::Result<()> {
    info!("command page");

    let store = ctx.task_store();
    let browser = load_browser(ctx, search, page)?;

    let mut out = io::stdout().lock();
    renderer.write_task_panel(&mut out, &store, filter)?;
    writeln!(out)?;
    renderer.write_posts_panel(&mut out, &browser)?;
    Ok(())
}

#[instrument(skip(ctx, renderer, command))]
fn cmd_tasks(ctx: &AppContext, renderer: &Renderer, command: TasksCommand) -> anyhow::Result<()> {
    let mut store = ctx.task_store();
    store.subscribe(|event| match event {
        TaskEvent::Added(task) => println!("Created task {}.", task.id),
        TaskEvent::Toggled { id, completed: true } => println!("Completed task {id}."),
        TaskEvent::Toggled { id, completed: false } => println!("Reopened task {id}."),
        TaskEvent::Removed(task) => println!("Deleted task {} '{}'.", task.id, task.text),
    });

    match command {
        TasksCommand::Add { text } => {
            info!("command tasks add");
            if store.add(&text.join(" ")).is_none() {
                debug!("blank task text; nothing added");
            }
        }
        TasksCommand::Toggle { id } => {
            info!("command tasks toggle");
            if store.toggle(&id).is_none() {
                report_missing(&id);
            }
        }
        TasksCommand::Remove { id } => {
            info!("command tasks remove");
            if store.remove(&id).is_none() {
                report_missing(&id);
            }
        }
        TasksCommand::List { filter } => {
            info!("command tasks list");
            let mut out = io::stdout().lock();
            renderer.write_task_panel(&mut out, &store, filter)?;
        }
    }

    report_persist_failure(&store);
    Ok(())
}

#[instrument(skip(ctx, renderer))]
fn cmd_posts(
    ctx: &AppContext,
    renderer: &Renderer,
    search: Option<&str>,
    page: i64,
) -> anyhow::Result<()> {
    info!("command posts");

    let browser = load_browser(ctx, search, page)?;
    let mut out = io::stdout().lock();
    renderer.write_posts_panel(&mut out, &browser)?;
    Ok(())
}

/// Activates a browser against the configured endpoint. A failed fetch is
/// not an error here; it leaves the browser in the failed phase.
fn load_browser(
    ctx: &AppContext,
    search: Option<&str>,
    page: i64,
) -> anyhow::Result<CollectionBrowser> {
    let source = HttpPostSource::from_config(&ctx.config)?;
    let mut browser = ctx.collection_browser()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed building async runtime")?;
    runtime.block_on(activate_and_position(&mut browser, &source, search, page))?;
    Ok(browser)
}

pub async fn activate_and_position<S: PostSource>(
    browser: &mut CollectionBrowser,
    source: &S,
    search: Option<&str>,
    page: i64,
) -> anyhow::Result<()> {
    browser.activate(source).await;
    if browser.error_message().is_some() {
        return Ok(());
    }

    if let Some(query) = search {
        browser.set_query(query)?;
    }
    browser.go_to_page(page)?;
    Ok(())
}

fn report_missing(id: &str) {
    warn!(id, "no task with that id");
    eprintln!("No task with id {id}.");
}

fn report_persist_failure(store: &TaskStore) {
    if let Some(message) = store.last_persist_error() {
        eprintln!("warning: changes were not saved: {message}");
    }
}
