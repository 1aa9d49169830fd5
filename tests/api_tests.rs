//! HTTP API tests against the in-memory store.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use faculty_tracker::api::{router, AppState};
use faculty_tracker::models::{Teacher, Zone};
use faculty_tracker::store::Store;
use serde_json::{json, Value};

// =============================================================================
// HELPERS
// =============================================================================

fn server() -> TestServer {
    TestServer::new(router(AppState::new(Store::memory()))).unwrap()
}

fn teacher_body(teacher_id: &str, first: &str, last: &str, department: &str) -> Value {
    json!({
        "teacher_id": teacher_id,
        "first_name": first,
        "last_name": last,
        "department": department,
        "position": "Instructor",
        "status": "Active",
        "enrolled_students": 184,
        "p1_failed": 18
    })
}

async fn create(server: &TestServer, body: Value) -> Teacher {
    let response = server.post("/api/teachers").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Teacher>()
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn create_precomputes_figures_and_zone() {
    let server = server();
    let teacher = create(&server, teacher_body("F-100", "Ana", "Reyes", "Math")).await;

    assert_eq!(teacher.p1_percent, Some(9.78));
    assert_eq!(teacher.p1_category.as_deref(), Some("GREEN (0.01%-10%)"));
    assert_eq!(teacher.zone, Some(Zone::Green));

    let listed = server.get("/api/teachers").await.json::<Vec<Teacher>>();
    assert_eq!(listed, vec![teacher.clone()]);

    let fetched = server
        .get(&format!("/api/teachers/{}", teacher.id))
        .await
        .json::<Teacher>();
    assert_eq!(fetched, teacher);
}

#[tokio::test]
async fn explicit_zone_is_kept() {
    let server = server();
    let mut body = teacher_body("F-100", "Ana", "Reyes", "Math");
    body["zone"] = json!("red");
    let teacher = create(&server, body).await;
    assert_eq!(teacher.zone, Some(Zone::Red));
}

#[tokio::test]
async fn create_rejects_missing_fields_with_one_message() {
    let server = server();
    let response = server
        .post("/api/teachers")
        .json(&json!({ "teacher_id": "F-1", "enrolled_students": 10, "p1_failed": 11 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("first_name is required"));
    assert!(message.contains("exceeds enrolled students"));
}

#[tokio::test]
async fn create_rejects_malformed_json() {
    let server = server();
    let response = server
        .post("/api/teachers")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn duplicate_faculty_number_conflicts() {
    let server = server();
    create(&server, teacher_body("F-100", "Ana", "Reyes", "Math")).await;
    let response = server
        .post("/api/teachers")
        .json(&teacher_body("F-100", "Ben", "Cruz", "Physics"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn update_by_query_id() {
    let server = server();
    let teacher = create(&server, teacher_body("F-100", "Ana", "Reyes", "Math")).await;

    let mut body = teacher_body("F-100", "Ana", "Reyes", "Physics");
    body["p1_failed"] = json!(100);
    let response = server
        .put("/api/teachers")
        .add_query_param("id", teacher.id)
        .json(&body)
        .await;
    response.assert_status_ok();

    let updated = response.json::<Teacher>();
    assert_eq!(updated.id, teacher.id);
    assert_eq!(updated.department, "Physics");
    assert_eq!(updated.p1_percent, Some(54.35));
    assert_eq!(updated.zone, Some(Zone::Red));
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let server = server();
    let response = server
        .put("/api/teachers")
        .add_query_param("id", "7f1c1d5e-8d64-4a2b-9a43-5f3d0f0b6a11")
        .json(&teacher_body("F-1", "Ana", "Reyes", "Math"))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let missing_id = server
        .put("/api/teachers")
        .json(&teacher_body("F-1", "Ana", "Reyes", "Math"))
        .await;
    missing_id.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// TABLE + REPORTS
// =============================================================================

#[tokio::test]
async fn table_filters_sorts_and_pages() {
    let server = server();
    create(&server, teacher_body("F-1", "Carla", "Diaz", "English")).await;
    create(&server, teacher_body("F-2", "ana", "Bautista", "Math")).await;
    create(&server, teacher_body("F-3", "Ben", "Alvarez", "Math")).await;

    let page = server
        .get("/api/teachers/table")
        .add_query_param("department", "Math")
        .add_query_param("sort", "name")
        .add_query_param("order", "desc")
        .add_query_param("page_size", 1)
        .await
        .json::<Value>();

    assert_eq!(page["total_items"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["has_next"], true);
    assert_eq!(page["items"][0]["teacher_id"], "F-3");
    assert_eq!(page["next_page"], 2);
    assert_eq!(page["sort"], json!({ "field": "name", "direction": "desc" }));

    let toggled = server
        .get("/api/teachers/table")
        .add_query_param("department", "Math")
        .add_query_param("sort", "name")
        .add_query_param("order", "desc")
        .add_query_param("toggle", "name")
        .await
        .json::<Value>();
    assert_eq!(toggled["sort"], json!({ "field": "name", "direction": "asc" }));
    assert_eq!(toggled["items"][0]["teacher_id"], "F-2");

    let bad = server
        .get("/api/teachers/table")
        .add_query_param("zone", "purple")
        .await;
    bad.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_for_period() {
    let server = server();
    create(&server, teacher_body("F-1", "Ana", "Reyes", "Math")).await;
    let mut heavy = teacher_body("F-2", "Ben", "Cruz", "Physics");
    heavy["p1_failed"] = json!(92);
    create(&server, heavy).await;

    let report = server
        .get("/api/reports")
        .add_query_param("period", "P1")
        .await
        .json::<Value>();
    assert_eq!(report["period"], "P1");
    assert_eq!(report["total_enrolled"], 368);
    assert_eq!(report["total_failed"], 110);
    assert_eq!(report["distribution"], json!({ "green": 1, "yellow": 0, "red": 1 }));
    assert_eq!(report["top"][0]["teacher_id"], "F-2");

    let p3 = server
        .get("/api/reports")
        .add_query_param("period", "P3")
        .await
        .json::<Value>();
    assert_eq!(p3["top"], json!([]));
    assert_eq!(p3["total_failed"], 0);
}

// =============================================================================
// TEMPLATE + UPLOAD
// =============================================================================

#[tokio::test]
async fn template_download_varies_by_semester() {
    let server = server();
    let first = server
        .get("/api/template")
        .add_query_param("semester", "1st")
        .await;
    first.assert_status_ok();
    assert!(first
        .header("content-disposition")
        .to_str()
        .unwrap()
        .contains("teacher_template_1st_semester.csv"));
    assert!(!first.text().contains("P3_Failed"));

    let second = server
        .get("/api/template")
        .add_query_param("semester", "2nd")
        .await;
    assert!(second.text().contains("P3_Failed,P3_Percent,P3_Category"));
}

#[tokio::test]
async fn upload_imports_and_upserts_rows() {
    let server = server();
    create(&server, teacher_body("F-100", "Ana", "Reyes", "Math")).await;

    let csv = "FacultyNo,FacultyName,EnrolledStudents,P1_Failed,P1_Percent,P1_Category\n\
               F-100,Ana Reyes,200,60,,\n\
               F-200,\"Cruz, Ben\",0,5,50,\n";
    let form = MultipartForm::new().add_text("type", "1st").add_part(
        "file",
        Part::bytes(csv.as_bytes().to_vec())
            .file_name("grades.csv")
            .mime_type("text/csv"),
    );
    let response = server.post("/api/upload").multipart(form).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("1 new, 1 updated"));

    let teachers = server.get("/api/teachers").await.json::<Vec<Teacher>>();
    assert_eq!(teachers.len(), 2);
    let ana = teachers.iter().find(|t| t.teacher_id == "F-100").unwrap();
    assert_eq!(ana.department, "Math");
    assert_eq!(ana.p1_percent, Some(30.0));
    assert_eq!(ana.zone, Some(Zone::Yellow));
    let ben = teachers.iter().find(|t| t.teacher_id == "F-200").unwrap();
    assert_eq!(ben.last_name, "Cruz");
    assert_eq!(ben.zone, Some(Zone::Red));
}

#[tokio::test]
async fn upload_rejects_unsupported_file_types_with_instructions() {
    let server = server();
    let form = MultipartForm::new().add_text("type", "1st").add_part(
        "file",
        Part::bytes(b"PK\x03\x04".to_vec())
            .file_name("grades.xlsx")
            .mime_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    );
    let response = server.post("/api/upload").multipart(form).await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = response.json::<Value>();
    assert!(body["error"].as_str().unwrap().contains("unsupported file type"));
    assert!(body["instructions"].as_str().unwrap().contains("CSV"));
}

#[tokio::test]
async fn upload_reports_bad_rows_without_instructions() {
    let server = server();
    let csv = "FacultyNo,FacultyName,EnrolledStudents\nF-1,Ana,10\n";
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(csv.as_bytes().to_vec())
            .file_name("grades.csv")
            .mime_type("text/csv"),
    );
    let response = server.post("/api/upload").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert!(body["error"].as_str().unwrap().starts_with("row 2:"));
    assert!(body.get("instructions").is_none());
    assert!(server.get("/api/teachers").await.json::<Vec<Teacher>>().is_empty());
}

#[tokio::test]
async fn health_reports_backend() {
    let server = server();
    let body = server.get("/health").await.json::<Value>();
    assert_eq!(body, json!({ "status": "ok", "backend": "memory" }));
}
