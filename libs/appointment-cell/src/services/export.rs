use shared_models::auth::User;

use crate::services::booking::AppointmentService;
use crate::{AppointmentError, AppointmentQuery, AppointmentView};

const HEADER: [&str; 9] = [
    "ID",
    "Patient",
    "Doctor",
    "Date",
    "Time",
    "Status",
    "Priority",
    "Reason",
    "Created",
];

impl AppointmentService {
    /// CSV of every appointment the caller may list, in listing order.
    pub async fn export_csv(&self, user: &User, query: &AppointmentQuery) -> Result<String, AppointmentError> {
        let views = self.list(user, query).await?;
        Ok(render_csv(&views))
    }
}

fn render_csv(views: &[AppointmentView]) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().map(|h| h.to_string()));

    for view in views {
        let a = &view.appointment;
        push_row(
            &mut out,
            [
                a.id.to_string(),
                view.patient_name.clone(),
                view.doctor_name.clone(),
                a.appointment_date.to_string(),
                view.start_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
                a.status.to_string(),
                a.priority.as_str().to_string(),
                a.reason.clone(),
                a.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
            .into_iter(),
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let row: Vec<String> = fields.map(|f| escape(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_with_separators_are_quoted() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("cough, fever"), "\"cough, fever\"");
        assert_eq!(escape("says \"ouch\""), "\"says \"\"ouch\"\"\"");
    }

    #[test]
    fn empty_export_has_only_the_header() {
        let csv = render_csv(&[]);
        assert_eq!(csv, "ID,Patient,Doctor,Date,Time,Status,Priority,Reason,Created\r\n");
    }
}
