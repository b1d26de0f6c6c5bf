use crate::{advisory::Advisory, server::SharedState};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
};
use plant_diagnosis::{decision::SERVER_ERROR_MESSAGE, Outcome, PredictionResult};
use std::fmt::Write;
use tracing::instrument;

use super::predict::confidence_percent;

const ROUTE: &str = "/diagnose";

const UPLOAD_FORM: &str = r#"<form action="/diagnose" method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept=".png,.jpg,.jpeg">
  <button type="submit">Diagnose</button>
</form>"#;

pub async fn upload_form() -> Html<String> {
    Html(page("Plant Disease Detection", UPLOAD_FORM))
}

#[instrument(skip(state, multipart))]
pub async fn diagnose(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> (StatusCode, Html<String>) {
    let diagnosis = match state.diagnose_upload(multipart, ROUTE).await {
        Ok(diagnosis) => diagnosis,
        Err(e) => {
            let status = e.status_code();
            let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!("Failed to store upload: {}", e);
                SERVER_ERROR_MESSAGE.to_string()
            } else {
                e.to_string()
            };
            let body = format!("<p class=\"error\">{}</p>\n{}", escape(&message), UPLOAD_FORM);
            return (status, Html(page("Plant Disease Detection", &body)));
        }
    };

    let result = &diagnosis.result;
    let advisory = result.class_key.and_then(|key| state.advisories.get(key));
    let status = match result.outcome {
        Outcome::Confident | Outcome::LowConfidence => StatusCode::OK,
        Outcome::Rejected => StatusCode::BAD_REQUEST,
        Outcome::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = render_result(result, &diagnosis.upload.url, advisory);
    (status, Html(page("Diagnosis", &body)))
}

pub fn render_result(result: &PredictionResult, image_url: &str, advisory: Option<&Advisory>) -> String {
    let mut body = String::new();
    if result.outcome != Outcome::ServerError {
        let _ = writeln!(body, "<img src=\"{}\" alt=\"uploaded leaf\">", escape(image_url));
    }

    match result.outcome {
        Outcome::Confident | Outcome::LowConfidence => {
            let _ = writeln!(
                body,
                "<h2>{}</h2>\n<p>Confidence: {:.2}%</p>",
                escape(result.class_name.as_deref().unwrap_or_default()),
                result.confidence.map(confidence_percent).unwrap_or_default()
            );
            if result.outcome == Outcome::LowConfidence {
                let _ = writeln!(body, "<p class=\"warning\">{}</p>", escape(&result.message));
            }
            if let Some(advisory) = advisory {
                render_advisory(&mut body, advisory);
            }
        }
        Outcome::Rejected => {
            let reason = result.rejection_reason.as_deref().unwrap_or(&result.message);
            let _ = writeln!(body, "<p class=\"error\">{}</p>", escape(reason));
        }
        Outcome::ServerError => {
            let _ = writeln!(body, "<p class=\"error\">{}</p>", escape(&result.message));
        }
    }

    body.push_str(UPLOAD_FORM);
    body
}

fn render_advisory(body: &mut String, advisory: &Advisory) {
    let _ = writeln!(body, "<h3>Causes</h3>\n<p>{}</p>", escape(&advisory.causes));
    let _ = writeln!(body, "<h3>Symptoms</h3>\n<p>{}</p>", escape(&advisory.symptoms));
    for (title, items) in [("Treatment", &advisory.treatment), ("Prevention", &advisory.prevention)] {
        let _ = writeln!(body, "<h3>{}</h3>\n<ul>", title);
        for item in items {
            let _ = writeln!(body, "  <li>{}</li>", escape(item));
        }
        body.push_str("</ul>\n");
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        escape(title),
        escape(title),
        body
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
