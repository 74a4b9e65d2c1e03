//! Server-rendered HTML for the web surface.
//!
//! Deliberately plain: a handful of format! templates with inline styles.

use crate::catalog::ExerciseRecord;
use crate::storage::{PersonalRecord, WorkoutRow, WorkoutSummary};
use crate::types::{Language, MuscleGroup};

const STYLE: &str = "font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Arial,sans-serif;\
background:linear-gradient(135deg,#667eea 0%,#764ba2 100%);min-height:100vh;\
display:flex;align-items:center;justify-content:center;padding:20px;margin:0";

const CARD: &str = "background:white;padding:40px;border-radius:20px;\
box-shadow:0 20px 60px rgba(0,0,0,0.3);max-width:720px;width:100%";

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{}</title>\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         </head>\n<body style=\"{STYLE}\">\n<div style=\"{CARD}\">\n{}\n</div>\n</body>\n</html>",
        escape(title),
        body
    )
}

pub fn render_home() -> String {
    page(
        "Workout Tracker",
        "<div style=\"text-align:center\">\
         <div style=\"font-size:4em\">💪</div>\
         <h1>Workout Tracker</h1>\
         <p>Please login via WhatsApp to access your personalized workout tracker.</p>\
         <div style=\"background:#f8f9fa;padding:20px;border-radius:10px;margin-top:30px\">\
         <p><strong>How to login:</strong></p>\
         <p>1. Open WhatsApp<br>2. Message your fitness bot<br>3. Type \"tracker\" to get your login link</p>\
         </div></div>",
    )
}

pub fn render_error(title: &str, message: &str) -> String {
    page(
        title,
        &format!(
            "<div style=\"text-align:center\">\
             <div style=\"font-size:4em\">❌</div>\
             <h2 style=\"color:#e74c3c\">{}</h2>\
             <p>{}</p></div>",
            escape(title),
            escape(message)
        ),
    )
}

pub fn render_dashboard(
    name: Option<&str>,
    summary: &WorkoutSummary,
    workouts: &[WorkoutRow],
    records: &[PersonalRecord],
) -> String {
    let mut body = format!(
        "<h1>💪 {}</h1>\
         <p>Workouts: <strong>{}</strong> · Exercises: <strong>{}</strong> · Total reps: <strong>{}</strong></p>",
        escape(name.unwrap_or("Your Dashboard")),
        summary.total_workouts,
        summary.total_exercises,
        summary.total_reps
    );

    body.push_str("<h2>Last 30 days</h2>");
    if workouts.is_empty() {
        body.push_str("<p>No workouts logged yet.</p>");
    } else {
        body.push_str("<table style=\"width:100%;border-collapse:collapse\">\
            <tr><th align=\"left\">Date</th><th align=\"left\">Muscle group</th>\
            <th align=\"left\">Exercise</th><th>Sets</th><th>Reps</th><th>Weight</th></tr>");
        for w in workouts {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td>\
                 <td align=\"center\">{}</td><td align=\"center\">{}</td><td align=\"center\">{}</td></tr>",
                escape(&w.date),
                escape(&w.muscle_group),
                escape(&w.exercise),
                w.sets,
                w.reps,
                w.weight
            ));
        }
        body.push_str("</table>");
    }

    body.push_str("<h2>Personal records</h2>");
    if records.is_empty() {
        body.push_str("<p>No personal records yet.</p>");
    } else {
        body.push_str("<ul>");
        for r in records {
            body.push_str(&format!(
                "<li><strong>{}</strong>: {} × {} on {}</li>",
                escape(&r.exercise),
                r.weight,
                r.reps,
                escape(&r.date_achieved)
            ));
        }
        body.push_str("</ul>");
    }

    body.push_str("<p style=\"margin-top:30px\"><a href=\"/logout\">Log out</a></p>");
    page("Dashboard", &body)
}

pub fn render_exercises(group: MuscleGroup, records: &[ExerciseRecord], lang: Language) -> String {
    let mut body = format!("<h1>{}</h1>", group.display_name(lang));
    if records.is_empty() {
        body.push_str("<p>No exercises found for this muscle group.</p>");
    } else {
        for record in records {
            body.push_str(&format!(
                "<div style=\"margin-bottom:24px\">\
                 <h3>{}</h3><p>{}</p>\
                 <img src=\"{}\" alt=\"{}\" style=\"max-width:100%;border-radius:10px\">\
                 </div>",
                escape(record.name(lang)),
                escape(&record.equipment),
                escape(&record.media_url),
                escape(record.name(lang)),
            ));
        }
    }
    body.push_str("<p><a href=\"/dashboard\">← Back to dashboard</a></p>");
    page(group.display_name(lang), &body)
}
