//! Daily occupancy report: one message per bookable facility with at least
//! one slot overlapping the reporting window.

use chrono::{DateTime, Utc};
use chrono_tz::Europe::Rome;

use crate::core::matcher::{self, MatchWindow, SlotOccupancy};
use crate::domain::model::{Facility, ReportMessage};
use crate::domain::ports::Mailer;
use crate::store::AvailabilityStore;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSummary {
    pub emails_sent: usize,
}

pub struct ReportJob<S, M> {
    store: S,
    mailer: M,
}

impl<S: AvailabilityStore, M: Mailer> ReportJob<S, M> {
    pub fn new(store: S, mailer: M) -> Self {
        Self { store, mailer }
    }

    /// Runs the report for the window anchored at `now`. Facilities that are
    /// not bookable, have no representative contact, or have no overlapping
    /// slots are skipped; everything else produces exactly one message.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReportSummary> {
        let window = MatchWindow::daily_report(now);
        let mut emails_sent = 0;

        for facility in self.store.query_facilities().await? {
            if !facility.bookable || !facility.has_contact() {
                continue;
            }

            let occupancies =
                matcher::match_facility(&self.store, &facility.facility_id, &window).await?;
            if occupancies.is_empty() {
                tracing::debug!(
                    "Facility {} has no slots in the report window",
                    facility.facility_id
                );
                continue;
            }

            let message = compose_report(&facility, &occupancies);
            self.mailer.send(&message).await?;
            emails_sent += 1;
        }

        tracing::info!("Sent {} occupancy reports", emails_sent);
        Ok(ReportSummary { emails_sent })
    }
}

/// Formats the legacy report: slot start times in Europe/Rome local time,
/// available/booked counts and the confirmation codes, or "no bookings" for
/// fully available slots.
pub fn compose_report(facility: &Facility, occupancies: &[SlotOccupancy]) -> ReportMessage {
    let mut description = String::new();

    for occupancy in occupancies {
        let local_start = occupancy.slot.start.with_timezone(&Rome);
        description.push_str(&format!("Slot delle {}", local_start.format("%H:%M")));
        if occupancy.booked_places() == 0 {
            description.push_str(": Nessuna prenotazione<br>");
        } else {
            description.push_str(&format!(
                ": Posti disponibili: {}, Posti prenotati: {}<br>I codici prenotazione sono i seguenti:",
                occupancy.slot.available_places,
                occupancy.booked_places()
            ));
            for code in &occupancy.codes {
                description.push_str(&format!("<br>{}", code));
            }
            description.push_str("<br>");
        }
    }

    let html_body = format!(
        "L'occupazione di oggi è:<br>{}<br>Buona giornata",
        description
    );

    ReportMessage {
        to: facility.representative.clone(),
        subject: format!("Report slots palestra digitale {}", facility.name),
        text_body: html_body.replace("<br>", "\n"),
        html_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Slot;
    use chrono::TimeZone;

    fn facility() -> Facility {
        Facility {
            facility_id: "1".to_string(),
            name: "Palestra Uno".to_string(),
            category: String::new(),
            opening_time_desc: String::new(),
            website: String::new(),
            street: String::new(),
            street_number: String::new(),
            building: String::new(),
            city: String::new(),
            province: String::new(),
            istat_code: String::new(),
            phone: String::new(),
            representative: "rep@example.com".to_string(),
            lat: String::new(),
            lon: String::new(),
            searchable: true,
            bookable: true,
        }
    }

    fn occupancy(available: u32, codes: &[&str]) -> SlotOccupancy {
        SlotOccupancy {
            slot: Slot::new(
                "1".to_string(),
                // 10:00 UTC in January is 11:00 in Rome (CET, no DST)
                Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                60,
                10,
                available,
                Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap(),
            )
            .unwrap(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_compose_report_with_bookings() {
        let message = compose_report(&facility(), &[occupancy(7, &["ABC123"])]);

        assert_eq!(message.to, "rep@example.com");
        assert_eq!(message.subject, "Report slots palestra digitale Palestra Uno");
        assert!(message.html_body.contains("Slot delle 11:00"));
        assert!(message
            .html_body
            .contains("Posti disponibili: 7, Posti prenotati: 3"));
        assert!(message.html_body.contains("<br>ABC123<br>"));
        assert!(message.text_body.contains("\nABC123\n"));
        assert!(!message.text_body.contains("<br>"));
    }

    #[test]
    fn test_compose_report_without_bookings() {
        let message = compose_report(&facility(), &[occupancy(10, &[])]);
        assert!(message.html_body.contains("Slot delle 11:00: Nessuna prenotazione"));
        assert!(message.html_body.starts_with("L'occupazione di oggi è:<br>"));
        assert!(message.html_body.ends_with("<br>Buona giornata"));
    }
}
