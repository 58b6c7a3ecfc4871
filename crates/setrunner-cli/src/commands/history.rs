use chrono::{Local, NaiveDate, TimeZone};
use clap::Subcommand;
use setrunner_core::storage::Database;
use setrunner_core::{CoreError, HistoryStore, SessionHistoryItem, SessionStatus};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List past sessions, most recent first, grouped by day
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one session as JSON
    Show {
        /// History entry ID
        id: String,
    },
    /// Delete every history entry
    Clear,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;

    match action {
        HistoryAction::List { json } => {
            let items = db.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No sessions yet.");
            } else {
                for (date, group) in group_by_date(&items, &Local) {
                    println!("{}", date.format("%A, %B %-d, %Y"));
                    for item in group {
                        println!("  {}", item_line(item, &Local));
                    }
                }
            }
        }
        HistoryAction::Show { id } => {
            let item = db.get(&id)?.ok_or(CoreError::HistoryNotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        HistoryAction::Clear => {
            let removed = db.clear()?;
            println!("cleared {removed} session(s)");
        }
    }
    Ok(())
}

/// Consecutive items sharing a calendar day in `tz`. Input order is kept, so
/// a most-recent-first list yields most-recent-first groups.
fn group_by_date<'a, Tz: TimeZone>(
    items: &'a [SessionHistoryItem],
    tz: &Tz,
) -> Vec<(NaiveDate, Vec<&'a SessionHistoryItem>)> {
    let mut groups: Vec<(NaiveDate, Vec<&SessionHistoryItem>)> = Vec::new();
    for item in items {
        let date = item.timestamp.with_timezone(tz).date_naive();
        match groups.last_mut() {
            Some((last, group)) if *last == date => group.push(item),
            _ => groups.push((date, vec![item])),
        }
    }
    groups
}

fn item_line<Tz: TimeZone>(item: &SessionHistoryItem, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mark = match item.status {
        SessionStatus::Completed => "✓",
        SessionStatus::Incomplete => "✗",
    };
    let config = item.config();
    let name = config.display_name();
    format!(
        "{} {mark} {name} ({}) {}",
        item.timestamp.with_timezone(tz).format("%H:%M"),
        item.summary(),
        item.id
    )
}
