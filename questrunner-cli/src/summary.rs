use colored::*;
use questrunner::{DiscoveryOutcome, TaskOutcome, WorkflowRun};

fn outcome_label(outcome: TaskOutcome) -> ColoredString {
    match outcome {
        TaskOutcome::Completed => "completed".green(),
        TaskOutcome::Attempted => "attempted".cyan(),
        TaskOutcome::Failed => "failed".red(),
        TaskOutcome::SkippedNotInteractable => "skipped".yellow(),
        TaskOutcome::Initial => "not reached".dimmed(),
    }
}

/// Print a run in a user-friendly format
pub fn display(run: &WorkflowRun) {
    println!();
    println!("{}", "═".repeat(60));

    if run.success {
        println!("{} all stages finished", "✅ SUCCESS:".green().bold());
    } else if let Some(reason) = &run.aborted {
        println!("{} run aborted: {reason}", "❌ FAILURE:".red().bold());
    } else if !run.logged_in {
        println!("{} not signed in", "❌ FAILURE:".red().bold());
    } else {
        println!("{} some stages failed", "❌ FAILURE:".red().bold());
    }

    println!("{}", "─".repeat(60));
    println!("📊 Points: {} → {}", run.points_before, run.points_after.bold());

    if let Some(search) = &run.search {
        println!(
            "🔎 Searches: {} desktop, {} mobile",
            search.desktop, search.mobile
        );
    }

    for group in &run.groups {
        println!("{}", "─".repeat(60));
        let icon = if group.success { "✓".green() } else { "✗".red() };
        println!("{icon} {}", group.name.bold());
        if let Some(error) = &group.error {
            println!("   • Error: {}", error.red());
        }
        let Some(report) = &group.report else {
            continue;
        };
        match report.discovery {
            DiscoveryOutcome::Empty => println!("   • No tasks shown"),
            DiscoveryOutcome::ContainerMissing => println!("   • Section not found"),
            DiscoveryOutcome::Tasks(_) => {
                for task in &report.tasks {
                    println!(
                        "   • {} [{}] ({} attempt{})",
                        task.candidate.label(),
                        outcome_label(task.state.outcome),
                        task.state.attempts_used,
                        if task.state.attempts_used == 1 { "" } else { "s" }
                    );
                }
            }
        }
    }
    println!("{}", "═".repeat(60));
}
