use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;

use chrono::Utc;

use crate::analytics;
use crate::email::relay::EmailRelay;
use crate::email::template::TemplateFields;
use crate::email::EmailManager;
use crate::error::Result;
use crate::hotels::HotelDirectory;
use crate::manager;
use crate::model::{ExportBundle, VisitRecord};
use crate::parser::{Command, FindBy};
use crate::VisitDb;

/// Executes parsed commands against one open store.
pub struct Shell<R> {
    db: Arc<VisitDb>,
    hotels: HotelDirectory,
    emails: EmailManager<R>,
}

pub const HELP: &str = "\
--- Available Commands ---
SCHEDULE 'hotel_001' ON 2026-11-02 [AT 14:00] [FOR 60] [PURPOSE \"..\"] [CONTACT \"..\"] [EMAIL \"..\"] [NOTES \"..\"]
GET 'visit_id'
FIND BY DATE 2026-11-02 | FIND BY HOTEL 'hotel_001' | FIND BY STATUS completed
SET STATUS 'visit_id' completed
DELETE 'visit_id'
TODAY | UPCOMING [days]
STATS             visit counts and success rate
STORAGE           tier sizes
SWEEP | MAINTAIN | REBUILD
EXPORT \"file.json\" | IMPORT \"file.json\"
HOTELS [\"query\"]
EMAIL <followUp|thankYou|serviceProposal|meetingRequest|contractRenewal|custom> 'visit_id' [field=\"value\" ...]
EMAIL HISTORY
EXIT";

impl<R: EmailRelay> Shell<R> {
    pub fn new(db: Arc<VisitDb>, hotels: HotelDirectory, emails: EmailManager<R>) -> Self {
        Self { db, hotels, emails }
    }

    /// Runs one command. `None` asks the caller to exit.
    pub async fn execute(&self, cmd: Command) -> Result<Option<String>> {
        let today = Utc::now().date_naive();
        let out = match cmd {
            Command::Exit => return Ok(None),
            Command::Help => HELP.to_string(),

            Command::Schedule(args) => {
                let hotel_name = self.hotels.get(&args.hotel_id)?.map(|h| h.name);
                let id = self.db.schedule(args.into_new_visit(hotel_name))?;
                format!("Visit scheduled: {}", id)
            }
            Command::Get { id } => match self.db.get_by_id(&id)? {
                Some(visit) => serde_json::to_string_pretty(&visit)?,
                None => format!("No visit with id '{}'", id),
            },
            Command::Find(by) => {
                let visits = match by {
                    FindBy::Date(date) => self.db.visits_by_date(&date.format("%Y-%m-%d").to_string())?,
                    FindBy::Hotel(hotel_id) => self.db.visits_by_hotel(&hotel_id)?,
                    FindBy::Status(status) => self.db.visits_by_status(status)?,
                };
                format_visits(&visits)
            }
            Command::SetStatus { id, status } => {
                if self.db.update_status(&id, status)? {
                    format!("Visit {} is now {}", id, status)
                } else {
                    format!("No visit with id '{}'", id)
                }
            }
            Command::Delete { id } => {
                if self.db.delete(&id)? {
                    format!("Deleted {}", id)
                } else {
                    format!("No visit with id '{}'", id)
                }
            }

            Command::Today => format_visits(&analytics::todays_visits(&self.db, today)?),
            Command::Upcoming { days } => format_visits(&analytics::upcoming_visits(&self.db, today, days)?),
            Command::Stats => {
                let s = analytics::visit_stats(&self.db, today)?;
                format!(
                    "Total: {} | Completed: {} | Scheduled: {} | Cancelled: {}\nThis month: {} ({} completed) | Success rate: {}%",
                    s.total, s.completed, s.scheduled, s.cancelled, s.this_month, s.completed_this_month, s.success_rate
                )
            }
            Command::Storage => {
                let s = self.db.stats()?;
                format!(
                    "Active: {} ({} bytes) | Archived: {} ({} bytes) | Total: {} ({} bytes) | Compression: {:.2}",
                    s.active_visits, s.active_size, s.archived_visits, s.archived_size, s.total_visits, s.total_size,
                    s.compression_ratio
                )
            }

            Command::Sweep => format!("Archived {} visits", self.db.sweep()?),
            Command::Maintain => {
                if manager::run_once(&self.db) {
                    "Maintenance completed".to_string()
                } else {
                    "Maintenance failed, see log".to_string()
                }
            }
            Command::Rebuild => format!("Indexed {} visits", self.db.rebuild_indexes()?),

            Command::Export { path } => {
                let bundle = self.db.export_data()?;
                fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
                format!("Exported to {}", path)
            }
            Command::Import { path } => {
                let bundle: ExportBundle = serde_json::from_str(&fs::read_to_string(&path)?)?;
                self.db.import_data(bundle)?;
                format!("Imported {}", path)
            }

            Command::Hotels { query } => {
                let hotels = if query.is_empty() { self.hotels.all()? } else { self.hotels.search(&query)? };
                let mut out = String::new();
                for h in &hotels {
                    let _ = writeln!(out, "{}  {:<40} {:<16} {}", h.id, h.name, h.area, h.phone);
                }
                let _ = write!(out, "{} hotels", hotels.len());
                out
            }

            Command::Email { kind, id, fields } => {
                let Some(visit) = self.db.get_by_id(&id)? else {
                    return Ok(Some(format!("No visit with id '{}'", id)));
                };
                let mut extra = TemplateFields::new();
                for (field, value) in fields {
                    extra.set(field, value);
                }
                let outcome = self.emails.send_template(kind, &visit, &extra).await;
                match (outcome.success, outcome.message_id, outcome.error) {
                    (true, Some(message_id), _) => format!("Email sent ({})", message_id),
                    (_, _, error) => format!("Email failed: {}", error.unwrap_or_default()),
                }
            }
            Command::EmailHistory => {
                let history = self.emails.history()?;
                let mut out = String::new();
                for entry in history.iter().rev() {
                    let _ = writeln!(out, "{}  {}  to {}  [{}]", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.subject, entry.to, entry.status);
                }
                let _ = write!(out, "{} emails", history.len());
                out
            }
        };
        Ok(Some(out))
    }
}

fn format_visits(visits: &[VisitRecord]) -> String {
    let mut out = String::new();
    for v in visits {
        let _ = writeln!(
            out,
            "{}  {} {:<5}  {:<36} [{}]{}",
            v.id,
            v.date.map(|d| d.to_string()).unwrap_or_else(|| "----------".into()),
            v.time.as_deref().unwrap_or(""),
            v.hotel_name.as_deref().or(v.hotel_id.as_deref()).unwrap_or("?"),
            v.status.map(|s| s.as_str()).unwrap_or("-"),
            if v.archived { " (archived)" } else { "" },
        );
    }
    let _ = write!(out, "{} visits", visits.len());
    out
}
