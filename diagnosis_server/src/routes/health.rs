use axum::response::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    classes: usize,
}

pub async fn healthcheck() -> Json<Health> {
    Json(Health {
        status: "Available",
        classes: plant_diagnosis::CLASS_NAMES.len(),
    })
}
