use anyhow::Context;
use chrono::Local;
use household_chores::{
    BoardSnapshot, ChoreEvent, HouseholdConfig, HouseholdView, NewTask, NewTemplate,
    MAX_HORIZON_WEEKS, ServiceConfig, TaskBoardStore, TaskStatus, TaskUpdate, UpdateNotifier,
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Characters of a task id shown in tables; commands accept any unique prefix.
const SHORT_ID_LEN: usize = 8;

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&render_row(&widths, &cells));
        out.push('\n');
    }
    out.push_str(&sep);
    out
}

fn render_row(widths: &[usize], cells: &[&str]) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.iter().enumerate() {
        let pad = widths[ci].saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad));
        line.push_str(" |");
    }
    line
}

fn render_tasks(board: &BoardSnapshot) -> String {
    let rows: Vec<Vec<String>> = board
        .tasks
        .iter()
        .map(|task| {
            vec![
                short_id(&task.id).to_string(),
                task.title.clone(),
                task.assignee_name.clone(),
                task.status.as_str().to_string(),
                task.template_id.clone().unwrap_or_default(),
            ]
        })
        .collect();
    format!(
        "{}\n{} pending, {} done (updated {})",
        render_table(&["id", "title", "assignee", "status", "template"], &rows),
        board.pending_count(),
        board.done_count(),
        board.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )
}

fn render_templates(board: &BoardSnapshot) -> String {
    let rows: Vec<Vec<String>> = board
        .templates
        .iter()
        .map(|t| vec![t.id.clone(), t.title.clone(), t.recurrence.to_string()])
        .collect();
    render_table(&["id", "title", "recurrence"], &rows)
}

fn render_events(events: &[ChoreEvent]) -> String {
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|event| {
            vec![
                event.start.format("%a %Y-%m-%d %H:%M").to_string(),
                event.end.format("%H:%M").to_string(),
                event.chore.clone(),
                event.member.clone(),
            ]
        })
        .collect();
    render_table(&["start", "end", "chore", "member"], &rows)
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Full id of the single task whose id starts with `prefix`.
fn resolve_task_id(board: &BoardSnapshot, prefix: &str) -> Result<String, String> {
    if board.find_task(prefix).is_some() {
        return Ok(prefix.to_string());
    }
    let matches: Vec<&str> = board
        .tasks
        .iter()
        .map(|task| task.id.as_str())
        .filter(|id| id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => Err(format!("task '{prefix}' not found")),
        _ => Err(format!("task id '{prefix}' is ambiguous")),
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                          Show this help\n  show                          Show the task board\n  people                        List people\n  person add <name...>          Add a person\n  person remove <name...>       Remove a person\n  templates                     List chore templates\n  template add <title...>       Add a weekly chore template\n  template remove <id>          Remove a template (its tasks are kept)\n  add <assignee> <title...>     Add a task\n  done <id>                     Mark a task done\n  reopen <id>                   Mark a task pending again\n  delete <id>                   Delete a task\n  cleanup                       Remove done tasks now\n  refresh                       Run the weekly refresh now\n  schedule [weeks]              Show the rotation schedule\n  next                          Show the next scheduled chore\n  quit|exit                     Exit"
    );
}

fn rest_of_line<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    }
}

fn household_from_config(config: &ServiceConfig) -> HouseholdConfig {
    config.households.first().cloned().unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("household_chores=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let household = household_from_config(&config);
    let plan = config.schedule.rotation_plan()?;
    let persistence = config.storage.open().context("opening storage")?;
    let store = Arc::new(TaskBoardStore::load(
        household.id.clone(),
        &household.board_defaults(),
        persistence,
        Arc::new(UpdateNotifier::new()),
    ));
    let view = HouseholdView::new(
        &household,
        plan.clone(),
        config.schedule.refresh_interval()?,
        Arc::clone(&store),
    );

    println!("{} (CLI) - type 'help' for commands\n", view.name());
    println!("{}", render_tasks(&store.snapshot()));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => println!("{}", render_tasks(&store.snapshot())),
            "people" => {
                let board = store.snapshot();
                if board.people.is_empty() {
                    println!("No people.");
                }
                for person in &board.people {
                    println!("  {person}");
                }
            }
            "person" => match (parts.next(), rest_of_line(parts)) {
                (Some("add"), Some(name)) => match store.add_person(&name) {
                    Ok(name) => println!("Added person {name}."),
                    Err(e) => println!("Error: {e}"),
                },
                (Some("remove"), Some(name)) => match store.remove_person(&name) {
                    Ok(()) => println!("Removed person {name}."),
                    Err(e) => println!("Error: {e}"),
                },
                _ => println!("Usage: person <add|remove> <name...>"),
            },
            "templates" => println!("{}", render_templates(&store.snapshot())),
            "template" => match (parts.next(), rest_of_line(parts)) {
                (Some("add"), Some(title)) => match store.add_template(NewTemplate::new(title)) {
                    Ok(template) => println!("Added template {} ({}).", template.id, template.title),
                    Err(e) => println!("Error: {e}"),
                },
                (Some("remove"), Some(id)) => match store.remove_template(&id) {
                    Ok(template) => println!("Removed template {}.", template.id),
                    Err(e) => println!("Error: {e}"),
                },
                _ => println!("Usage: template <add <title...>|remove <id>>"),
            },
            "add" => match (parts.next(), rest_of_line(parts)) {
                (Some(assignee), Some(title)) => match store.add_task(NewTask::new(title, assignee)) {
                    Ok(task) => println!(
                        "Added task {}: {} ({}).",
                        short_id(&task.id),
                        task.title,
                        task.assignee_name
                    ),
                    Err(e) => println!("Error: {e}"),
                },
                _ => println!("Usage: add <assignee> <title...>"),
            },
            "done" | "reopen" | "delete" => {
                let Some(prefix) = parts.next() else {
                    println!("Usage: {cmd} <id>");
                    continue;
                };
                let id = match resolve_task_id(&store.snapshot(), prefix) {
                    Ok(id) => id,
                    Err(message) => {
                        println!("Error: {message}");
                        continue;
                    }
                };
                match cmd {
                    "delete" => match store.delete_task(&id) {
                        Ok(task) => println!("Deleted task {}: {}.", short_id(&task.id), task.title),
                        Err(e) => println!("Error: {e}"),
                    },
                    _ => {
                        let result = if cmd == "done" {
                            store.complete_task(&id)
                        } else {
                            store.update_task(
                                &id,
                                TaskUpdate {
                                    status: Some(TaskStatus::Pending),
                                    ..TaskUpdate::default()
                                },
                            )
                        };
                        match result {
                            Ok(task) => println!(
                                "Task {} is {}.",
                                short_id(&task.id),
                                task.status.as_str()
                            ),
                            Err(e) => println!("Error: {e}"),
                        }
                    }
                }
            }
            "cleanup" => match store.remove_done_tasks() {
                Ok(removed) => println!("Removed {removed} done task(s)."),
                Err(e) => println!("Error: {e}"),
            },
            "refresh" => match store.weekly_refresh() {
                Ok(created) => println!("Created {created} task(s)."),
                Err(e) => println!("Error: {e}"),
            },
            "schedule" => {
                let weeks = match parts.next().map(str::parse::<u32>) {
                    None => 1,
                    Some(Ok(weeks)) if (1..=MAX_HORIZON_WEEKS).contains(&weeks) => weeks,
                    Some(_) => {
                        println!("Usage: schedule [weeks] (1-{MAX_HORIZON_WEEKS})");
                        continue;
                    }
                };
                let events = plan.clone().with_horizon(weeks).generate(
                    &view.members(),
                    &view.chores(),
                    &Local::now(),
                );
                println!("{}", render_events(&events));
            }
            "next" => match view.next_chore_summary(&Local::now()) {
                Some(summary) => println!("Next chore: {summary}"),
                None => println!("No chores scheduled."),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
    Ok(())
}
