use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use serde_json::Value;

use crate::app::services::{InMemoryReadingsService, ReadingsQueryHandler, ServiceError};

#[derive(Clone)]
pub struct ApiState {
    pub readings: InMemoryReadingsService,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorResponse {
    pub sensor: String,
    pub value: Value,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(get_dashboard_endpoint)
        .service(list_usage_endpoint)
        .service(get_latest_usage_endpoint)
        .service(get_sensor_endpoint)
        .service(get_status_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/dashboard")]
async fn get_dashboard_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.readings.dashboard() {
        Ok(Some(dashboard)) => HttpResponse::Ok().json(dashboard),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "no dashboard data available"
        })),
        Err(error) => service_error_response(error),
    }
}

#[get("/usage")]
async fn list_usage_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.readings.usage() {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(error) => service_error_response(error),
    }
}

#[get("/usage/latest")]
async fn get_latest_usage_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.readings.latest_usage() {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => HttpResponse::NoContent().finish(),
        Err(error) => service_error_response(error),
    }
}

#[get("/sensors/{key}")]
async fn get_sensor_endpoint(
    state: web::Data<ApiState>,
    key: web::Path<String>,
) -> impl Responder {
    let key = key.into_inner();
    match state.readings.sensor_value(&key) {
        Ok(Some(value)) => HttpResponse::Ok().json(SensorResponse { sensor: key, value }),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("no value for sensor '{key}'")
        })),
        Err(error) => service_error_response(error),
    }
}

#[get("/status")]
async fn get_status_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.readings.refresh_status() {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match error {
        ServiceError::ReadingsLockPoisoned => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "readings lock poisoned"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, body::to_bytes, http::StatusCode, test, web};
    use serde_json::json;

    use crate::app::services::{InMemoryReadingsService, ReadingsCommandHandler};
    use crate::domain::models::{DashboardSnapshot, UsageRecord, UsageReport};

    use super::{ApiState, configure_routes};

    fn sample_report() -> UsageReport {
        let dashboard: DashboardSnapshot = serde_json::from_value(json!({
            "addresses": [{"street": "123 Main St", "premiseId": "p1"}],
            "billAmount": 142.55,
            "isPastDue": false
        }))
        .expect("dashboard fixture should deserialize");
        let usage: Vec<UsageRecord> = serde_json::from_value(json!([
            {"period": "2024-05-09", "usage": 23.4, "cost": 3.1},
            {"period": "2024-05-10", "usage": 19.7, "cost": 2.6}
        ]))
        .expect("usage fixture should deserialize");

        UsageReport { usage, dashboard }
    }

    fn build_state_with_readings() -> ApiState {
        let readings = InMemoryReadingsService::new();
        readings
            .record_refresh(sample_report(), "2024-05-10T12:00:00.000Z".to_string())
            .expect("refresh should succeed");
        ApiState { readings }
    }

    #[actix_web::test]
    async fn health_endpoint_returns_ok() {
        let state = ApiState {
            readings: InMemoryReadingsService::new(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn dashboard_returns_404_before_first_refresh() {
        let state = ApiState {
            readings: InMemoryReadingsService::new(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/dashboard").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn dashboard_serves_published_snapshot() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/dashboard").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        assert_eq!(json["billAmount"], 142.55);
        assert_eq!(json["addresses"][0]["street"], "123 Main St");
    }

    #[actix_web::test]
    async fn usage_serves_all_records_in_order() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/usage").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        let items = json.as_array().expect("response should be an array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["period"], "2024-05-09");
        assert_eq!(items[1]["period"], "2024-05-10");
    }

    #[actix_web::test]
    async fn latest_usage_returns_no_content_when_empty() {
        let state = ApiState {
            readings: InMemoryReadingsService::new(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/usage/latest").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn latest_usage_returns_most_recent_record() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/usage/latest").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        assert_eq!(json["period"], "2024-05-10");
        assert_eq!(json["usage"], 19.7);
    }

    #[actix_web::test]
    async fn sensor_endpoint_resolves_dashboard_and_usage_keys() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/sensors/billAmount")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        assert_eq!(json["sensor"], "billAmount");
        assert_eq!(json["value"], 142.55);

        let req = test::TestRequest::get().uri("/sensors/usage").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        assert_eq!(json["value"], 19.7);
    }

    #[actix_web::test]
    async fn sensor_endpoint_returns_404_for_unknown_key() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/sensors/noSuchField")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn status_reports_refresh_metadata() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(build_state_with_readings()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("body should be json");
        assert_eq!(json["refreshedAt"], "2024-05-10T12:00:00.000Z");
        assert_eq!(json["consecutiveMisses"], 0);
        assert_eq!(json["hasData"], true);
    }
}
