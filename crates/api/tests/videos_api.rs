//! Integration tests for video upload, listing, extraction, and deletion.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, get, post_empty, post_json, upload, upload_and_extract};
use serde_json::json;

#[tokio::test]
async fn upload_derives_sanitized_id_and_probes() {
    let t = common::build_test_app();
    let response = upload(&t.app, "My Clip.MP4", b"synthetic", &[]).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["video_id"], "My_Clip");
    assert_eq!(json["data"]["filename"], "My Clip.MP4");
    assert_eq!(json["data"]["fps"], 10.0);
    assert_eq!(json["data"]["total_frames"], 30);
    assert_eq!(json["data"]["width"], 64);
    assert_eq!(json["data"]["duration"], 3.0);
}

#[tokio::test]
async fn upload_into_folder_with_custom_name() {
    let t = common::build_test_app();
    let response = upload(
        &t.app,
        "raw.mov",
        b"synthetic",
        &[("folder_name", "site_a"), ("custom_name", "North Gate")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["video_id"], "North_Gate");
    assert_eq!(json["data"]["folder_name"], "site_a");

    let listed = body_json(get(&t.app, "/api/videos").await).await;
    assert_eq!(listed["data"][0]["folder_name"], "site_a");
    assert_eq!(listed["data"][0]["filename"], "North_Gate.mov");
}

#[tokio::test]
async fn upload_rejects_unsupported_extension() {
    let t = common::build_test_app();
    let response = upload(&t.app, "notes.txt", b"hello", &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "UNSUPPORTED_INPUT");
}

#[tokio::test]
async fn upload_rejects_folder_escape() {
    let t = common::build_test_app();
    let response = upload(&t.app, "a.mp4", b"synthetic", &[("folder_name", "../up")]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let t = common::build_test_app();
    let response = post_empty(&t.app, "/api/videos/upload").await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_video_is_404() {
    let t = common::build_test_app();
    let response = get(&t.app, "/api/videos/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn extract_with_default_interval_takes_first_frame() {
    let t = common::build_test_app();
    upload(&t.app, "clip.mp4", b"synthetic", &[]).await;

    // 30 frames at 10 fps with a 10 s interval: only frame 0 is sampled.
    let response = post_empty(&t.app, "/api/videos/clip/extract").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["frames_extracted"], 1);
    assert_eq!(json["data"]["interval_seconds"], 10.0);
    assert_eq!(json["data"]["frames"][0]["frame_id"], "clip_0000");
    assert_eq!(json["data"]["frames"][0]["timestamp_sec"], 0.0);
}

#[tokio::test]
async fn extract_rejects_non_positive_interval() {
    let t = common::build_test_app();
    upload(&t.app, "clip.mp4", b"synthetic", &[]).await;

    let response = post_json(&t.app, "/api/videos/clip/extract", json!({ "frame_interval": 0 })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn extract_unknown_video_is_404() {
    let t = common::build_test_app();
    let response = post_json(&t.app, "/api/videos/ghost/extract", json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn frames_listing_reports_status_and_respects_limit() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;

    let json = body_json(get(&t.app, &format!("/api/videos/{video_id}/frames")).await).await;
    assert_eq!(json["data"]["total"], 3);
    let frames = json["data"]["frames"].as_array().unwrap();
    assert_eq!(frames[0]["frame_id"], "My_Clip_0000");
    assert_eq!(frames[2]["frame_id"], "My_Clip_0002");
    assert!(frames.iter().all(|f| f["status"] == "pending"));

    let limited =
        body_json(get(&t.app, &format!("/api/videos/{video_id}/frames?limit=2")).await).await;
    assert_eq!(limited["data"]["total"], 3);
    assert_eq!(limited["data"]["frames"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn replace_existing_clears_previous_frames() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;

    let response = post_json(
        &t.app,
        &format!("/api/videos/{video_id}/extract"),
        json!({ "frame_interval": 2, "replace_existing": true }),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["frames_extracted"], 2);

    let json = body_json(get(&t.app, &format!("/api/videos/{video_id}/frames")).await).await;
    assert_eq!(json["data"]["total"], 2);
}

#[tokio::test]
async fn delete_cascades_and_is_idempotent() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    put_labels(&t.app, &video_id).await;

    let info = body_json(get(&t.app, &format!("/api/videos/{video_id}/delete-info")).await).await;
    assert_eq!(info["data"]["frames_count"], 3);
    assert_eq!(info["data"]["labels_count"], 1);

    let response = delete(&t.app, &format!("/api/videos/{video_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["video_deleted"], true);
    assert_eq!(json["data"]["deleted_frames"], 3);
    assert_eq!(json["data"]["deleted_labels"], 1);

    let again = body_json(delete(&t.app, &format!("/api/videos/{video_id}")).await).await;
    assert_eq!(again["data"]["video_deleted"], false);
    assert_eq!(again["data"]["deleted_frames"], 0);

    let listed = body_json(get(&t.app, "/api/videos").await).await;
    assert!(listed["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn global_stats_aggregate_all_videos() {
    let t = common::build_test_app();
    let video_id = upload_and_extract(&t.app).await;
    upload(&t.app, "other.mkv", b"synthetic", &[]).await;
    put_labels(&t.app, &video_id).await;

    let json = body_json(get(&t.app, "/api/stats").await).await;
    assert_eq!(json["data"]["total_videos"], 2);
    assert_eq!(json["data"]["total_frames"], 3);
    assert_eq!(json["data"]["approved_frames"], 1);
    assert_eq!(json["data"]["pending_frames"], 2);
}

async fn put_labels(app: &axum::Router, video_id: &str) {
    let response = common::put_json(
        app,
        &format!("/api/frames/{video_id}/{video_id}_0000/labels"),
        json!({ "labels": [
            { "class_name": "car", "x_center": 0.5, "y_center": 0.5, "width": 0.2, "height": 0.1 }
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
