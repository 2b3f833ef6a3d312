//! Integration tests for archive export and export statistics.

mod common;

use std::io::{Cursor, Read};

use axum::http::{header, StatusCode};
use common::{body_bytes, body_json, get, put_json, upload, upload_and_extract};
use serde_json::json;
use zip::ZipArchive;

fn entry_names(archive: &[u8]) -> Vec<String> {
    let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    zip.file_names().map(str::to_string).collect()
}

fn read_entry(archive: &[u8], name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut out = String::new();
    zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
    out
}

async fn label_frame(app: &axum::Router, video_id: &str, seq: u32, class_name: &str) {
    let response = put_json(
        app,
        &format!("/api/frames/{video_id}/{video_id}_{seq:04}/labels"),
        json!({ "labels": [
            { "class_name": class_name, "x_center": 0.5, "y_center": 0.25, "width": 0.2, "height": 0.1 }
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn export_returns_zip_attachment_of_approved_frames() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    label_frame(&t.app, &video_id, 1, "bus").await;

    let response = get(&t.app, &format!("/api/export/{video_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"My_Clip_labels.zip\""
    );

    let archive = body_bytes(response).await;
    let mut names = entry_names(&archive);
    names.sort();
    assert_eq!(
        names,
        vec![
            "classes.txt",
            "images/My_Clip_frame_0001.jpg",
            "labels/My_Clip_frame_0001.txt",
        ]
    );

    let manifest = read_entry(&archive, "classes.txt");
    assert_eq!(manifest.lines().next(), Some("person"));
    assert_eq!(manifest.lines().count(), 12);
    assert_eq!(
        read_entry(&archive, "labels/My_Clip_frame_0001.txt"),
        "bus 0.500000 0.250000 0.200000 0.100000"
    );
}

#[tokio::test]
async fn export_by_class_id_rewrites_leading_token() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    label_frame(&t.app, &video_id, 0, "car").await;

    let response = get(&t.app, &format!("/api/export/{video_id}?use_class_id=true")).await;
    let archive = body_bytes(response).await;

    assert_eq!(
        read_entry(&archive, "labels/My_Clip_frame_0000.txt"),
        "1 0.500000 0.250000 0.200000 0.100000"
    );
}

#[tokio::test]
async fn export_all_frames_includes_pending_images() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    label_frame(&t.app, &video_id, 0, "dog").await;

    let response = get(&t.app, &format!("/api/export/{video_id}?only_approved=false")).await;
    let names = entry_names(&body_bytes(response).await);

    assert_eq!(names.iter().filter(|n| n.starts_with("images/")).count(), 3);
    assert_eq!(names.iter().filter(|n| n.starts_with("labels/")).count(), 1);
}

#[tokio::test]
async fn export_with_nothing_approved_holds_only_manifest() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;

    let response = get(&t.app, &format!("/api/export/{video_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entry_names(&body_bytes(response).await), vec!["classes.txt"]);
}

#[tokio::test]
async fn export_without_frames_is_404() {
    let t = common::build_test_app();
    upload(&t.app, "bare.mp4", b"synthetic", &[]).await;

    let response = get(&t.app, "/api/export/bare").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&t.app, "/api/export/bare/stats").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_stats_report_progress_and_class_distribution() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    label_frame(&t.app, &video_id, 0, "bus").await;
    label_frame(&t.app, &video_id, 2, "bus").await;

    let response = get(&t.app, &format!("/api/export/{video_id}/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["total_frames"], 3);
    assert_eq!(json["data"]["approved_frames"], 2);
    assert_eq!(json["data"]["pending_frames"], 1);
    assert_eq!(json["data"]["exportable_frames"], 2);
    assert_eq!(json["data"]["class_distribution"]["bus"], 2);
    let ratio = json["data"]["approval_ratio"].as_f64().unwrap();
    assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
}
