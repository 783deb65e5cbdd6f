use chrono::{Datelike, FixedOffset, Local, NaiveDate, Offset};
use clap::Subcommand;
use solosync_core::api::SessionLogRecord;
use solosync_core::history::{sessions_on, HistoryStats, MonthGrid};
use solosync_core::Config;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List logged sessions, newest first
    List {
        /// Only sessions on this day (YYYY-MM-DD)
        #[arg(long)]
        day: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Month calendar with completed days marked
    Calendar {
        /// Month to show (YYYY-MM), defaults to the current one
        #[arg(long)]
        month: Option<String>,
    },
    /// Weekly streak and totals
    Stats,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let api = super::api_client(&config)?;
    let records = super::runtime()?.block_on(api.list_session_logs())?;

    let now = Local::now();
    let offset: FixedOffset = now.offset().fix();
    let today = now.date_naive();

    match action {
        HistoryAction::List { day, json } => {
            let mut shown: Vec<&SessionLogRecord> = match day {
                Some(day) => sessions_on(&records, offset, day),
                None => records.iter().collect(),
            };
            shown.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if shown.is_empty() {
                println!("no sessions logged");
            } else {
                for record in shown {
                    print_record(record, offset);
                }
            }
        }
        HistoryAction::Calendar { month } => {
            let (year, month) = match month {
                Some(m) => parse_month(&m)?,
                None => (today.year(), today.month()),
            };
            let stats = HistoryStats::compute(&records, offset, today);
            let grid = MonthGrid::build(year, month, &stats).ok_or("invalid month")?;
            print!("{}", render_grid(&grid));
        }
        HistoryAction::Stats => {
            let stats = HistoryStats::compute(&records, offset, today);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

fn print_record(record: &SessionLogRecord, offset: FixedOffset) {
    let at = record.completed_at.with_timezone(&offset);
    let difficulty = record
        .physical_difficulty
        .map(|d| format!("difficulty {d}/5"))
        .unwrap_or_default();
    println!(
        "{}  {:<32}  {}",
        at.format("%Y-%m-%d %H:%M"),
        record.routine_name.as_deref().unwrap_or("(unknown routine)"),
        difficulty
    );
    if let Some(notes) = record.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        println!("    notes: {notes}");
    }
    for metric in &record.logged_metrics {
        let value = match &metric.metric_value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!(
            "    {}: {} = {value}",
            metric.drill_name.as_deref().unwrap_or("-"),
            metric.metric_name
        );
    }
}

fn parse_month(s: &str) -> Result<(i32, u32), String> {
    let invalid = || format!("expected YYYY-MM, got '{s}'");
    let (year, month) = s.split_once('-').ok_or_else(invalid)?;
    let year = year.parse().map_err(|_| invalid())?;
    let month = month.parse().map_err(|_| invalid())?;
    Ok((year, month))
}

/// Monday-first grid; completed days carry a `*`.
pub(crate) fn render_grid(grid: &MonthGrid) -> String {
    let mut out = format!("{}\n Mo  Tu  We  Th  Fr  Sa  Su\n", grid.title());
    for week in &grid.weeks {
        let row: Vec<String> = week
            .iter()
            .map(|day| match day {
                Some(d) if d.completed => format!("{:>3}*", d.date.day()),
                Some(d) => format!("{:>3} ", d.date.day()),
                None => "    ".to_string(),
            })
            .collect();
        out.push_str(row.join("").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_argument() {
        assert_eq!(parse_month("2024-05").unwrap(), (2024, 5));
        assert!(parse_month("May").is_err());
        assert!(parse_month("2024-xx").is_err());
    }

    #[test]
    fn grid_marks_completed_days() {
        let record: SessionLogRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "completed_at": "2024-05-14T09:00:00Z"
        }))
        .unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let stats = HistoryStats::compute(&[record], utc, today);
        let grid = MonthGrid::build(2024, 5, &stats).unwrap();

        let text = render_grid(&grid);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "May 2024");
        assert_eq!(lines[2], "          1   2   3   4   5");
        assert!(lines[4].contains(" 14*"));
    }
}
