mod common;

use axum::http::{header, StatusCode};
use common::{
    get, identity, location, post_form, post_multipart, read_bytes, read_json, read_text, Part,
    TestApp, ASSET_BASE,
};
use cte_portal::models::Program;
use cte_portal::store::PortalStore;

async fn create_course(app: &TestApp, cookie: &str, name: &str) -> serde_json::Value {
    let response = app
        .send(post_multipart(
            "/admin/courses/add",
            Some(cookie),
            &[
                Part::Text("name", name),
                Part::Text("description", "An introduction"),
                Part::File {
                    name: "poster",
                    filename: "poster one.png",
                    content_type: "image/png",
                    data: b"\x89PNG",
                },
                Part::File {
                    name: "handout",
                    filename: "",
                    content_type: "application/octet-stream",
                    data: b"",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/dashboard");

    let body = read_json(app.send(get("/admin/dashboard", Some(cookie))).await).await;
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["name"] == name)
        .cloned()
        .expect("created item")
}

#[tokio::test]
async fn create_uploads_poster_and_stores_url() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;

    let item = create_course(&app, &cookie, "Rust 101").await;

    let poster_url = item["poster_url"].as_str().unwrap();
    assert!(poster_url.starts_with(&format!("{}/courses/posters/", ASSET_BASE)));
    assert!(poster_url.ends_with("_poster_one.png"));
    assert!(item["handout_url"].is_null());
    let keys = app.storage.keys().await;
    assert_eq!(keys.len(), 1);
    assert_eq!(app.storage.get(&keys[0]).await.unwrap().data, b"\x89PNG");
}

#[tokio::test]
async fn create_without_description_is_rejected() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;

    let response = app
        .send(post_multipart(
            "/admin/courses/add",
            Some(&cookie),
            &[Part::Text("name", "Rust 101"), Part::Text("description", "  ")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.list_items(Program::Courses).await.unwrap().is_empty());
}

#[tokio::test]
async fn edit_changes_only_supplied_fields() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Rust 101").await;
    let id = item["id"].as_str().unwrap();

    let response = app
        .send(post_multipart(
            &format!("/admin/courses/{}/edit", id),
            Some(&cookie),
            &[Part::Text("name", "Rust 102"), Part::Text("description", "")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let items = app.store.list_items(Program::Courses).await.unwrap();
    assert_eq!(items[0].name, "Rust 102");
    assert_eq!(items[0].description, "An introduction");
    assert_eq!(items[0].poster_url.as_deref(), item["poster_url"].as_str());

    let response = app
        .send(post_multipart(
            "/admin/courses/5d1c1f2e-0000-4000-8000-000000000000/edit",
            Some(&cookie),
            &[Part::Text("name", "Ghost")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_reports_assets_it_could_not_remove() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Rust 101").await;
    let id = item["id"].as_str().unwrap();
    app.storage.set_fail_deletes(true);

    let response = app
        .send(post_form(
            &format!("/admin/courses/{}/delete", id),
            Some(&cookie),
            "",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "partial");
    assert_eq!(body["failed_assets"][0], item["poster_url"]);
    assert!(app.store.list_items(Program::Courses).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_assets_and_redirects() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Rust 101").await;
    let id = item["id"].as_str().unwrap();

    let response = app
        .send(post_form(
            &format!("/admin/courses/{}/delete", id),
            Some(&cookie),
            "",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.storage.keys().await.is_empty());

    let response = app
        .send(post_form(
            &format!("/admin/courses/{}/delete", id),
            Some(&cookie),
            "",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn techweekend_events_mirror_course_routes() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;

    let response = app
        .send(post_multipart(
            "/admin/techweekend/events/add",
            Some(&cookie),
            &[
                Part::Text("name", "Hackathon"),
                Part::Text("event_description", "24 hours"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/techweekend/dashboard");

    let body = read_json(
        app.send(get("/admin/techweekend/dashboard", Some(&cookie)))
            .await,
    )
    .await;
    assert_eq!(body["program"], "techweekend");
    assert_eq!(body["items"][0]["description"], "24 hours");
    assert!(body["users"].is_null());
    assert!(app.store.list_items(Program::Courses).await.unwrap().is_empty());
}

async fn register(app: &TestApp, user: &str, name: &str, item: &str) -> String {
    let cookie = app
        .session_for(identity(user, &format!("{}@goa.bits-pilani.ac.in", user), name))
        .await;
    let response = app
        .send(post_form(
            &format!("/dashboard/register/{}", item),
            Some(&cookie),
            "",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    cookie
}

#[tokio::test]
async fn grouped_csv_download() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let c1 = create_course(&app, &cookie, "Course1").await;
    let c2 = create_course(&app, &cookie, "Course, \"Two\"").await;
    let c1 = c1["id"].as_str().unwrap();
    let c2 = c2["id"].as_str().unwrap();
    register(&app, "alice", "Alice", c1).await;
    register(&app, "alice", "Alice", c2).await;
    register(&app, "bob", "Bob", c1).await;

    let response = app
        .send(get("/admin/registrations/download", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"registrations_grouped.csv\""
    );

    let body = read_bytes(response).await;
    let mut reader = csv::Reader::from_reader(body.as_slice());
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec![
            "email",
            "display_name",
            "phone_number",
            "courses_registered",
            "total_courses"
        ]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "alice@goa.bits-pilani.ac.in");
    assert_eq!(&rows[0][3], "Course1, Course, \"Two\"");
    assert_eq!(&rows[0][4], "2");
    assert_eq!(&rows[1][1], "Bob");
    assert_eq!(&rows[1][4], "1");
}

#[tokio::test]
async fn single_item_csv_download() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Course1").await;
    let id = item["id"].as_str().unwrap();
    let path = format!("/admin/registrations/{}/download", id);

    let response = app.send(get(&path, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        "No registrations found for this course"
    );

    register(&app, "bob", "Bob", id).await;
    let response = app.send(get(&path, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"registrations_{}.csv\"", id).as_str()
    );
    let text = read_text(response).await;
    assert_eq!(
        text,
        "\"email\",\"display_name\",\"phone_number\"\n\"bob@goa.bits-pilani.ac.in\",\"Bob\",\"\"\n"
    );
}

#[tokio::test]
async fn roster_is_paginated() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Course1").await;
    let id = item["id"].as_str().unwrap();
    for n in 0..45 {
        register(&app, &format!("user{:02}", n), &format!("User {:02}", n), id).await;
    }

    let body = read_json(
        app.send(get("/admin/dashboard?page=3&limit=20", Some(&cookie)))
            .await,
    )
    .await;
    assert_eq!(body["pagination"]["total_pages"], 3);
    assert_eq!(body["pagination"]["offset"], 40);
    assert_eq!(body["pagination"]["prev_page"], 2);
    assert!(body["pagination"]["next_page"].is_null());
    let rows = body["registrations"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["display_name"], "User 40");

    let body = read_json(
        app.send(get("/admin/dashboard?page=9&limit=abc", Some(&cookie)))
            .await,
    )
    .await;
    assert_eq!(body["pagination"]["limit"], 20);
    assert!(body["registrations"].as_array().unwrap().is_empty());
    assert!(body["pagination"]["next_page"].is_null());
}

#[tokio::test]
async fn admin_can_remove_a_registration() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    let item = create_course(&app, &cookie, "Course1").await;
    let id = item["id"].as_str().unwrap();
    register(&app, "bob", "Bob", id).await;

    let response = app
        .send(post_form(
            "/admin/registrations/delete",
            Some(&cookie),
            "user_id=bob",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = format!("user_id=bob&item_id={}", id);
    let response = app
        .send(post_form("/admin/registrations/delete", Some(&cookie), &body))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app
        .store
        .registered_item_ids(Program::Courses, "bob")
        .await
        .unwrap()
        .is_empty());

    let response = app
        .send(post_form("/admin/registrations/delete", Some(&cookie), &body))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promote_and_demote() {
    let app = TestApp::new();
    let cookie = app.admin_cookie("root").await;
    app.session_for(identity("bob", "bob@goa.bits-pilani.ac.in", "Bob"))
        .await;

    let response = app
        .send(post_form(
            "/admin/promote",
            Some(&cookie),
            "email=bob%40goa.bits-pilani.ac.in",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/dashboard?tab=users");

    let body = read_json(
        app.send(get("/admin/dashboard?tab=users", Some(&cookie)))
            .await,
    )
    .await;
    assert_eq!(body["active_tab"], "users");
    let bob = body["users"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == "bob")
        .cloned()
        .unwrap();
    assert_eq!(bob["role"], "Admin");

    let response = app
        .send(post_form(
            "/admin/promote",
            Some(&cookie),
            "email=bob%40goa.bits-pilani.ac.in",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .send(post_form("/admin/promote", Some(&cookie), "email="))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(post_form(
            "/admin/demote",
            Some(&cookie),
            "email=root%40goa.bits-pilani.ac.in",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(post_form(
            "/admin/demote",
            Some(&cookie),
            "email=bob%40goa.bits-pilani.ac.in",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app
        .store
        .find_admin("bob@goa.bits-pilani.ac.in")
        .await
        .unwrap()
        .is_none());
}
