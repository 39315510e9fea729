//! CLI handlers for `pit checklist` subcommands.

use anyhow::{Context as _, Result};

use pit_api::models::{ChecklistStatus, MarkStatus};
use pit_api::queries::checklists as checklist_queries;
use pit_core::autosave::{AutosaveConfig, AutosaveCoordinator, ChecklistNotes, NotesField, SaveStatus};
use pit_core::checklist::{ChecklistTracker, display_state, start_checklist};

use crate::ChecklistCommands;
use crate::context::{Context, user_error};

pub async fn run_checklist_command(command: ChecklistCommands, ctx: &Context) -> Result<()> {
    match command {
        ChecklistCommands::List { class } => cmd_list(ctx, class).await,
        ChecklistCommands::Show { status_id } => {
            let tracker = load(ctx, status_id).await?;
            print_status(&tracker);
            Ok(())
        }
        ChecklistCommands::Start { template, class } => {
            let tracker = start_checklist(ctx.transport.clone(), ctx.viewer, template, class)
                .await
                .map_err(user_error)?;
            let status = tracker.status();
            println!(
                "Checklist {} started with {} item(s).",
                status.id,
                status.marks.len()
            );
            Ok(())
        }
        ChecklistCommands::Mark {
            status_id,
            mark_id,
            state,
        } => {
            let target: MarkStatus = state
                .parse()
                .with_context(|| format!("unknown mark state {state:?}"))?;
            let tracker = load(ctx, status_id).await?;
            let mark = tracker
                .set_mark(mark_id, target)
                .await
                .map_err(user_error)?;
            println!("Mark #{} is {}.", mark.id, display_state(&mark));
            Ok(())
        }
        ChecklistCommands::Notes { status_id, text } => cmd_notes(ctx, status_id, &text).await,
        ChecklistCommands::Submit { status_id } => {
            let tracker = load(ctx, status_id).await?;
            let status = tracker.submit().await.map_err(user_error)?;
            println!("Checklist {} is {}.", status.id, status.state);
            Ok(())
        }
    }
}

async fn load(ctx: &Context, status_id: i64) -> Result<ChecklistTracker> {
    ChecklistTracker::load(ctx.transport.clone(), ctx.viewer, status_id)
        .await
        .map_err(user_error)
}

fn print_status(tracker: &ChecklistTracker) {
    let status = tracker.status();
    let readiness = tracker.readiness();
    let caps = tracker.capabilities(None);

    println!("Checklist {}: {}", status.id, status.template.name);
    println!("  State:    {}", status.state);
    println!("  Complete: {:.0}%", status.percent_complete);
    if !status.student_notes.is_empty() {
        println!("  Notes:    {}", status.student_notes);
    }
    println!();
    for mark in &status.marks {
        println!(
            "  #{:<6} {:<12} {} {}",
            mark.id,
            display_state(mark).to_string(),
            mark.item.code,
            mark.item.text
        );
    }
    println!();
    if caps.can_submit_checklist {
        println!("  Ready to submit.");
    } else if !readiness.is_ready() {
        println!("  {} item(s) still pending.", readiness.pending);
    }
}

async fn cmd_list(ctx: &Context, class: Option<i64>) -> Result<()> {
    let statuses = checklist_queries::list_statuses(ctx.transport.as_ref(), class)
        .await
        .map_err(user_error)?;

    if statuses.is_empty() {
        println!("No checklists found.");
        return Ok(());
    }

    println!("{:<8} {:<16} {:<24} TEMPLATE", "ID", "STATE", "STUDENT");
    for status in &statuses {
        println!(
            "{:<8} {:<16} {:<24} {}",
            status.id,
            status.state.to_string(),
            student_name(status),
            status.template.name
        );
    }
    Ok(())
}

fn student_name(status: &ChecklistStatus) -> String {
    status
        .student
        .as_ref()
        .map(|s| s.display_name())
        .unwrap_or_default()
}

async fn cmd_notes(ctx: &Context, status_id: i64, text: &str) -> Result<()> {
    let tracker = load(ctx, status_id).await?;
    let status = tracker.status();
    let committer =
        ChecklistNotes::new(ctx.transport.clone(), &ctx.viewer, &status).map_err(user_error)?;

    let autosave = AutosaveCoordinator::new(committer, AutosaveConfig::notes());
    autosave.track(NotesField::StudentNotes, status.student_notes);
    autosave.change(NotesField::StudentNotes, text);

    match autosave.flush(NotesField::StudentNotes).await {
        SaveStatus::Error(msg) => anyhow::bail!(msg),
        SaveStatus::Saved => println!("Notes saved."),
        _ => println!("Notes unchanged."),
    }
    Ok(())
}
