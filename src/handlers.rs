// src/handlers.rs
use std::sync::Arc;

use actix_web::{HttpResponse, web};
use futures_util::future;
use log::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::errors::KisskinError;
use crate::models::{AnalyzeRequest, AnalyzeResponse, DataUrl, Profile};
use crate::report;
use crate::services::GenerationBackend;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn GenerationBackend>,
}

pub async fn analyze(
    data: web::Data<AppState>,
    body: web::Json<AnalyzeRequest>,
) -> Result<HttpResponse, KisskinError> {
    let req = body.into_inner();
    req.validate()?;
    let profile = Profile::from_request(&req)?;
    let photo = DataUrl::parse(&req.photo)?;

    // The image edit runs on the client's pre-tiled sheet when one was sent.
    let grid_source = match req.grid_photo.as_deref() {
        Some(grid) if !grid.trim().is_empty() => DataUrl::parse(grid)?,
        _ => photo,
    };

    // Checked after input validation, before any outbound call.
    let api_key = config::provider_api_key()?;

    let request_id = Uuid::new_v4();
    info!(
        "[{request_id}] analyze: gender={} skin={} layout={} tiled_source={}",
        profile.gender.label_en(),
        profile.skin_type.label_en(),
        profile.layout,
        req.grid_photo.is_some(),
    );

    // Both calls run concurrently; each branch succeeds or fails on its own.
    let (report_result, image_result) = future::join(
        data.llm.consultation_report(&api_key, &req.photo, &profile),
        data.llm.style_grid(&api_key, &grid_source, &profile),
    )
    .await;

    match (report_result, image_result) {
        (Err(report_err), Err(image_err)) => {
            warn!("[{request_id}] both provider calls failed: {report_err}; {image_err}");
            Err(KisskinError::upstream_with_detail(
                "Analysis failed",
                format!("report: {report_err}; image: {image_err}"),
            ))
        }
        (report_result, image_result) => {
            let report = match report_result {
                Ok(text) => Some(report::normalize(&text)),
                Err(e) => {
                    warn!("[{request_id}] report generation failed: {e}");
                    None
                }
            };
            let image = match image_result {
                Ok(b64) => Some(format!("data:image/png;base64,{b64}")),
                Err(e) => {
                    warn!("[{request_id}] grid generation failed: {e}");
                    None
                }
            };
            info!(
                "[{request_id}] analyze done: image={} report={}",
                image.is_some(),
                report.is_some()
            );
            Ok(HttpResponse::Ok().json(AnalyzeResponse { image, report }))
        }
    }
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "kisskin",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::ENV_LOCK;

    #[derive(Default)]
    struct StubBackend {
        report: Option<String>,
        image: Option<String>,
        calls: AtomicUsize,
        grid_source_len: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl GenerationBackend for StubBackend {
        async fn consultation_report(
            &self,
            _api_key: &str,
            _photo_data_url: &str,
            _profile: &Profile,
        ) -> Result<String, KisskinError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.report
                .clone()
                .ok_or_else(|| KisskinError::upstream("report backend down"))
        }

        async fn style_grid(
            &self,
            _api_key: &str,
            photo: &DataUrl,
            _profile: &Profile,
        ) -> Result<String, KisskinError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.grid_source_len.lock().unwrap() = Some(photo.bytes.len());
            self.image
                .clone()
                .ok_or_else(|| KisskinError::upstream("image backend down"))
        }
    }

    async fn call(stub: Arc<StubBackend>, body: Value) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState { llm: stub }))
                .service(web::scope("/api").route("/analyze", web::post().to(analyze))),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/analyze")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let value: Value = test::read_body_json(resp).await;
        (status, value)
    }

    fn valid_body() -> Value {
        let photo = DataUrl::encode("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]);
        json!({ "photo": photo, "gender": "여성", "skinType": "건성" })
    }

    fn with_api_key() -> std::sync::MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap();
        unsafe { std::env::set_var("OPENAI_API_KEY", "test-key") };
        guard
    }

    #[actix_web::test]
    async fn missing_fields_are_rejected_before_any_backend_call() {
        let stub = Arc::new(StubBackend::default());
        let (status, body) = call(
            stub.clone(),
            json!({ "gender": "여성", "skinType": "건성" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn malformed_photo_is_rejected_before_any_backend_call() {
        let stub = Arc::new(StubBackend::default());
        let mut body = valid_body();
        body["photo"] = json!("definitely-not-a-data-url");
        let (status, resp) = call(stub.clone(), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!resp["error"].as_str().unwrap().is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn unsupported_gender_is_rejected() {
        let stub = Arc::new(StubBackend::default());
        let mut body = valid_body();
        body["gender"] = json!("dragon");
        let (status, _) = call(stub.clone(), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn missing_api_key_is_a_config_error_with_no_calls() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { std::env::remove_var("OPENAI_API_KEY") };

        let stub = Arc::new(StubBackend::default());
        let (status, body) = call(stub.clone(), valid_body()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "API key not configured");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn report_survives_a_failed_image_branch() {
        let _guard = with_api_key();
        let stub = Arc::new(StubBackend {
            report: Some("## 피부 분석\n좋아요".into()),
            image: None,
            ..Default::default()
        });
        let (status, body) = call(stub.clone(), valid_body()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"], "## 피부 분석\n좋아요");
        assert!(body.get("image").is_none());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn image_survives_a_failed_report_branch() {
        let _guard = with_api_key();
        let stub = Arc::new(StubBackend {
            report: None,
            image: Some("Z3JpZA==".into()),
            ..Default::default()
        });
        let (status, body) = call(stub, valid_body()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "data:image/png;base64,Z3JpZA==");
        assert!(body.get("report").is_none());
    }

    #[actix_web::test]
    async fn both_branches_failing_is_an_upstream_error() {
        let _guard = with_api_key();
        let stub = Arc::new(StubBackend::default());
        let (status, body) = call(stub, valid_body()).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body["error"].as_str().unwrap().is_empty());
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("report backend down"));
        assert!(detail.contains("image backend down"));
    }

    #[actix_web::test]
    async fn fenced_structured_report_is_normalized() {
        let _guard = with_api_key();
        let fenced =
            "```json\n{\"analysis\": \"봄 웜톤\", \"products\": []}\n```".to_string();
        let stub = Arc::new(StubBackend {
            report: Some(fenced),
            image: Some("Z3JpZA==".into()),
            ..Default::default()
        });
        let (status, body) = call(stub, valid_body()).await;

        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_str(body["report"].as_str().unwrap()).unwrap();
        assert_eq!(report["analysis"], "봄 웜톤");
    }

    #[actix_web::test]
    async fn pre_tiled_grid_photo_replaces_the_selfie_as_edit_source() {
        let _guard = with_api_key();
        let stub = Arc::new(StubBackend {
            report: Some("ok".into()),
            image: Some("Z3JpZA==".into()),
            ..Default::default()
        });

        let tiled = DataUrl::encode("image/png", &[9u8; 64]);
        let mut body = valid_body();
        body["gridPhoto"] = json!(tiled);
        body["gridSize"] = json!("3x3");

        let (status, _) = call(stub.clone(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(*stub.grid_source_len.lock().unwrap(), Some(64));
    }

    #[actix_web::test]
    async fn health_reports_the_service_name() {
        let app = test::init_service(
            actix_web::App::new().route("/health", web::get().to(health_check)),
        )
        .await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["service"], "kisskin");
    }
}
