//! CLI handlers for `pit plan` subcommands.

use anyhow::Result;
use chrono::NaiveDate;

use pit_api::models::Plan;
use pit_api::queries::plans::{self as plan_queries, GeneratePlanRequest, PlanFilter};
use pit_core::autosave::{AutosaveConfig, AutosaveCoordinator, PlanField, PlanObjectives, SaveStatus};
use pit_core::checklist::{ChecklistTracker, Readiness};
use pit_core::ordering::{BucketKey, TaskBoard};
use pit_core::permissions::Capabilities;
use pit_core::state::PlanTracker;
use pit_core::state::dispatch::generate_plan;

use crate::PlanCommands;
use crate::context::{Context, user_error};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan_command(command: PlanCommands, ctx: &Context) -> Result<()> {
    match command {
        PlanCommands::List { student } => cmd_list(ctx, student).await,
        PlanCommands::Show { plan_id } => cmd_show(ctx, plan_id).await,
        PlanCommands::Generate {
            class,
            student,
            date,
        } => cmd_generate(ctx, class, student, date).await,
        PlanCommands::Submit { plan_id, checklist } => cmd_submit(ctx, plan_id, checklist).await,
        PlanCommands::Approve { plan_id } => {
            let tracker = load(ctx, plan_id).await?;
            let plan = tracker.approve().await.map_err(user_error)?;
            println!("Plan {} approved.", plan.id);
            Ok(())
        }
        PlanCommands::Objectives { plan_id, text } => cmd_objectives(ctx, plan_id, &text).await,
        PlanCommands::SelfEval { plan_id, text } => {
            let tracker = load(ctx, plan_id).await?;
            let plan = tracker
                .record_self_evaluation(&text)
                .await
                .map_err(user_error)?;
            println!("Self-evaluation recorded. Plan {} is {}.", plan.id, plan.status);
            Ok(())
        }
        PlanCommands::TeacherEval { plan_id, text } => {
            let tracker = load(ctx, plan_id).await?;
            let plan = tracker
                .record_teacher_evaluation(&text)
                .await
                .map_err(user_error)?;
            println!("Evaluation recorded. Plan {} is {}.", plan.id, plan.status);
            Ok(())
        }
    }
}

async fn load(ctx: &Context, plan_id: i64) -> Result<PlanTracker> {
    PlanTracker::load(ctx.transport.clone(), ctx.viewer, plan_id)
        .await
        .map_err(user_error)
}

// -----------------------------------------------------------------------
// Formatting
// -----------------------------------------------------------------------

fn action_names(caps: &Capabilities) -> Vec<&'static str> {
    let mut names = Vec::new();
    if caps.can_edit_structure {
        names.push("edit");
    }
    if caps.can_submit_plan {
        names.push("submit");
    }
    if caps.can_approve_plan {
        names.push("approve");
    }
    if caps.can_self_evaluate {
        names.push("self-eval");
    }
    if caps.can_evaluate {
        names.push("teacher-eval");
    }
    names
}

fn print_plan(plan: &Plan, caps: &Capabilities) {
    let student = plan
        .student
        .as_ref()
        .map(|s| s.display_name())
        .unwrap_or_else(|| "-".to_owned());

    println!("Plan {}: {}", plan.id, plan.period_label);
    println!("  Student:  {student}");
    println!("  Status:   {}", plan.status);
    if !plan.general_objectives.is_empty() {
        println!("  Objectives: {}", plan.general_objectives);
    }
    if !plan.self_evaluation.is_empty() {
        println!("  Self-evaluation: {}", plan.self_evaluation);
    }
    if !plan.teacher_evaluation.is_empty() {
        println!("  Teacher evaluation: {}", plan.teacher_evaluation);
    }

    let board = TaskBoard::from_plan(plan);
    for section in board.sections() {
        println!();
        println!("  [{}] {} ({})", section.id, section.title, section.code());
        for task in board.bucket(BucketKey::Section(section.id)) {
            println!("    {:>3}. #{} {} [{}]", task.order, task.id, task.description, task.state);
        }
    }
    let unassigned = board.bucket(BucketKey::Unassigned);
    if !unassigned.is_empty() {
        println!();
        println!("  Unassigned");
        for task in unassigned {
            println!("    {:>3}. #{} {} [{}]", task.order, task.id, task.description, task.state);
        }
    }

    let actions = action_names(caps);
    println!();
    if actions.is_empty() {
        println!("  Actions: none");
    } else {
        println!("  Actions: {}", actions.join(", "));
    }
}

// -----------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------

async fn cmd_list(ctx: &Context, student: Option<i64>) -> Result<()> {
    let filter = PlanFilter {
        student,
        ..PlanFilter::default()
    };
    let plans = plan_queries::list_plans(ctx.transport.as_ref(), &filter)
        .await
        .map_err(user_error)?;

    if plans.is_empty() {
        println!("No plans found.");
        return Ok(());
    }

    println!("{:<8} {:<12} {:<24} PERIOD", "ID", "STATUS", "STUDENT");
    for plan in &plans {
        let student = plan
            .student
            .as_ref()
            .map(|s| s.display_name())
            .unwrap_or_default();
        println!(
            "{:<8} {:<12} {:<24} {}",
            plan.id,
            plan.status.to_string(),
            student,
            plan.period_label
        );
    }
    Ok(())
}

async fn cmd_show(ctx: &Context, plan_id: i64) -> Result<()> {
    let tracker = load(ctx, plan_id).await?;
    print_plan(&tracker.plan(), &tracker.capabilities(Readiness::complete()));
    Ok(())
}

async fn cmd_generate(
    ctx: &Context,
    class: i64,
    student: Option<i64>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let request = GeneratePlanRequest {
        student_class_id: class,
        student_id: student,
        target_date: date,
    };
    let plan = generate_plan(ctx.transport.as_ref(), &ctx.viewer, &request)
        .await
        .map_err(user_error)?;
    println!("Plan {} ({}) ready.", plan.id, plan.status);
    Ok(())
}

async fn cmd_submit(ctx: &Context, plan_id: i64, checklist: Option<i64>) -> Result<()> {
    let readiness = match checklist {
        Some(id) => ChecklistTracker::load(ctx.transport.clone(), ctx.viewer, id)
            .await
            .map_err(user_error)?
            .readiness(),
        None => Readiness::complete(),
    };

    let tracker = load(ctx, plan_id).await?;
    let plan = tracker.submit(readiness).await.map_err(user_error)?;
    println!("Plan {} submitted.", plan.id);
    Ok(())
}

async fn cmd_objectives(ctx: &Context, plan_id: i64, text: &str) -> Result<()> {
    let tracker = load(ctx, plan_id).await?;
    let plan = tracker.plan();
    let committer =
        PlanObjectives::new(ctx.transport.clone(), &ctx.viewer, &plan).map_err(user_error)?;

    let autosave = AutosaveCoordinator::new(committer, AutosaveConfig::default());
    autosave.track(PlanField::GeneralObjectives, plan.general_objectives);
    autosave.change(PlanField::GeneralObjectives, text);

    match autosave.flush(PlanField::GeneralObjectives).await {
        SaveStatus::Error(msg) => anyhow::bail!(msg),
        SaveStatus::Saved => println!("Objectives saved."),
        _ => println!("Objectives unchanged."),
    }
    Ok(())
}
