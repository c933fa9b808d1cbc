use serde::Serialize;
use tera::{Context, Tera};

use crate::{NotificationError, RenderedEmail};

const TEMPLATES: &[(&str, &str)] = &[
    (
        "confirmation.txt",
        "Dear {{ patient_name }},\n\n\
Your appointment with Dr. {{ doctor_name }} has been scheduled for {{ appointment_date }} at {{ appointment_time }}.\n\
Reason: {{ reason }}\n\n\
Please arrive 15 minutes before your scheduled appointment.\n\n\
Thank you,\n{{ site_name }}\n",
    ),
    (
        "confirmation.html",
        "<p>Dear {{ patient_name }},</p>\
<p>Your appointment with Dr. {{ doctor_name }} has been scheduled for <strong>{{ appointment_date }}</strong> at <strong>{{ appointment_time }}</strong>.</p>\
<p>Reason: {{ reason }}</p>\
<p>Please arrive 15 minutes before your scheduled appointment.</p>\
<p>Thank you,<br>{{ site_name }}</p>",
    ),
    (
        "doctor_notification.txt",
        "Dr. {{ doctor_name }},\n\n\
A new appointment with {{ patient_name }} has been scheduled for {{ appointment_date }} at {{ appointment_time }}.\n\
Reason: {{ reason }}\n\n{{ site_name }}\n",
    ),
    (
        "doctor_notification.html",
        "<p>Dr. {{ doctor_name }},</p>\
<p>A new appointment with {{ patient_name }} has been scheduled for <strong>{{ appointment_date }}</strong> at <strong>{{ appointment_time }}</strong>.</p>\
<p>Reason: {{ reason }}</p><p>{{ site_name }}</p>",
    ),
    (
        "reminder.txt",
        "Dear {{ recipient_name }},\n\n\
This is a reminder for the appointment between {{ patient_name }} and Dr. {{ doctor_name }} scheduled for {{ appointment_date }} at {{ appointment_time }}.\n\n\
Thank you,\n{{ site_name }}\n",
    ),
    (
        "reminder.html",
        "<p>Dear {{ recipient_name }},</p>\
<p>This is a reminder for the appointment between {{ patient_name }} and Dr. {{ doctor_name }} scheduled for <strong>{{ appointment_date }}</strong> at <strong>{{ appointment_time }}</strong>.</p>\
<p>Thank you,<br>{{ site_name }}</p>",
    ),
    (
        "cancellation.txt",
        "Dear {{ recipient_name }},\n\n\
The appointment between {{ patient_name }} and Dr. {{ doctor_name }} on {{ appointment_date }} at {{ appointment_time }} has been cancelled by {{ cancelled_by }}.\n\
Reason: {{ reason }}\n\n{{ site_name }}\n",
    ),
    (
        "cancellation.html",
        "<p>Dear {{ recipient_name }},</p>\
<p>The appointment between {{ patient_name }} and Dr. {{ doctor_name }} on <strong>{{ appointment_date }}</strong> at <strong>{{ appointment_time }}</strong> has been cancelled by {{ cancelled_by }}.</p>\
<p>Reason: {{ reason }}</p><p>{{ site_name }}</p>",
    ),
    (
        "no_show.txt",
        "Dear {{ patient_name }},\n\n\
Our records show that you missed your appointment with Dr. {{ doctor_name }} on {{ appointment_date }} at {{ appointment_time }}.\n\
Please contact us to book a new appointment.\n\n{{ site_name }}\n",
    ),
    (
        "no_show.html",
        "<p>Dear {{ patient_name }},</p>\
<p>Our records show that you missed your appointment with Dr. {{ doctor_name }} on <strong>{{ appointment_date }}</strong> at <strong>{{ appointment_time }}</strong>.</p>\
<p>Please contact us to book a new appointment.</p><p>{{ site_name }}</p>",
    ),
];

/// Plain-text and HTML email bodies, rendered with tera.
pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, NotificationError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Self { tera })
    }

    /// Renders `<name>.txt` and, when present, `<name>.html`.
    pub fn render<C: Serialize>(&self, name: &str, context: &C) -> Result<RenderedEmail, NotificationError> {
        let context = Context::from_serialize(context)?;

        let text = self.tera.render(&format!("{}.txt", name), &context)?;

        let html_name = format!("{}.html", name);
        let html = if self.tera.get_template_names().any(|t| t == html_name) {
            Some(self.tera.render(&html_name, &context)?)
        } else {
            None
        };

        Ok(RenderedEmail { text, html })
    }
}
