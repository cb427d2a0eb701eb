mod common;

use axum::http::{header, Method, StatusCode};
use common::*;
use serde_json::{json, Value};

fn answer_session(name: &str) -> Value {
    json!({
        "session_type": "answer",
        "name": name,
        "provider": "openai",
        "model": "gpt-4o-mini",
        "source_urls": ["https://example.com/post"],
        "qa_data": [
            {"question": "Who leads?", "answer": "Acme leads, ahead of Globex.", "input_tokens": 100,
             "output_tokens": 50, "cost": 0.5, "accuracy": 80.0},
            {"question": "Who else?", "answer": "Globex, and \"Initech\"\nsometimes.", "input_tokens": 10,
             "output_tokens": 5, "cost": 0.25}
        ],
        "statistics": {"total_cost": 999.0, "avg_accuracy": 1.0, "total_input_tokens": 1,
                       "total_output_tokens": 1, "question_count": 42}
    })
}

async fn save(app: &axum::Router, token: &str, body: Value) -> Value {
    let reply = post(app, "/api/sessions", Some(token), body).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    reply.json()
}

#[tokio::test]
async fn saved_statistics_are_recomputed_by_the_server() {
    let app = app(state());
    let (token, _) = register(&app, "stats@example.com").await;

    let saved = save(&app, &token, answer_session("Launch")).await;
    let stats = &saved["statistics"];
    assert_eq!(stats["total_cost"], 0.75);
    assert_eq!(stats["avg_accuracy"], 80.0);
    assert_eq!(stats["total_input_tokens"], 110);
    assert_eq!(stats["total_output_tokens"], 55);
    assert_eq!(stats["question_count"], 2);
    assert_eq!(saved["name"], "Launch");

    let fetched = get(&app, &format!("/api/sessions/{}", saved["id"].as_str().unwrap()), &token).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["qa_data"][1]["question"], "Who else?");
}

#[tokio::test]
async fn accuracy_outside_percent_range_is_rejected() {
    let app = app(state());
    let (token, _) = register(&app, "range@example.com").await;

    for accuracy in [250.0, -5.0] {
        let mut body = answer_session("bad accuracy");
        body["qa_data"][0]["accuracy"] = json!(accuracy);
        let reply = post(&app, "/api/sessions", Some(&token), body).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", accuracy);
    }

    let mut edge = answer_session("edges");
    edge["qa_data"][0]["accuracy"] = json!(100.0);
    edge["qa_data"][1]["accuracy"] = json!(0.0);
    save(&app, &token, edge).await;
    assert_eq!(get(&app, "/api/sessions", &token).await.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_filters_by_type_newest_first() {
    let app = app(state());
    let (token, _) = register(&app, "list@example.com").await;

    save(&app, &token, answer_session("first")).await;
    let mut question = answer_session("questions");
    question["session_type"] = json!("question");
    save(&app, &token, question).await;
    save(&app, &token, answer_session("second")).await;

    let all = get(&app, "/api/sessions", &token).await.json();
    assert_eq!(all.as_array().unwrap().len(), 3);

    let answers = get(&app, "/api/sessions?type=answer", &token).await.json();
    let names: Vec<&str> = answers.as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["second", "first"]);

    let bad = get(&app, "/api/sessions?type=draft", &token).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sessions_are_invisible_to_other_users() {
    let app = app(state());
    let (owner, _) = register(&app, "owner@example.com").await;
    let (intruder, _) = register(&app, "intruder@example.com").await;

    let saved = save(&app, &owner, answer_session("private")).await;
    let uri = format!("/api/sessions/{}", saved["id"].as_str().unwrap());

    assert_eq!(get(&app, &uri, &intruder).await.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, Method::DELETE, &uri, Some(&intruder), None).await.status, StatusCode::NOT_FOUND);
    assert!(get(&app, "/api/sessions", &intruder).await.json().as_array().unwrap().is_empty());

    assert_eq!(send(&app, Method::DELETE, &uri, Some(&owner), None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&app, &uri, &owner).await.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, Method::DELETE, &uri, Some(&owner), None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn benchmark_counts_brand_and_competitor_mentions() {
    let app = app(state());
    let (token, _) = register(&app, "bench@example.com").await;
    let saved = save(&app, &token, answer_session("bench")).await;
    let id = saved["id"].as_str().unwrap();

    let reply = get(&app, &format!("/api/sessions/{}/benchmark?brand=Acme&competitors=Globex,%20Initech", id), &token).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let body = reply.json();
    assert_eq!(body["answers_analyzed"], 2);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["name"], "Acme");
    assert_eq!(entries[0]["is_brand"], true);
    assert_eq!(entries[1]["answers_mentioning"], 2);
    assert_eq!(entries[2]["total_mentions"], 1);

    let empty = get(&app, &format!("/api/sessions/{}/benchmark", id), &token).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_stats_group_costs() {
    let app = app(state());
    let (token, _) = register(&app, "dash@example.com").await;
    save(&app, &token, answer_session("a")).await;
    let mut gemini = answer_session("b");
    gemini["provider"] = json!("gemini");
    gemini["model"] = json!("gemini-1.5-flash");
    save(&app, &token, gemini).await;

    let stats = get(&app, "/api/stats", &token).await.json();
    assert_eq!(stats["total_sessions"], 2);
    assert_eq!(stats["answer_sessions"], 2);
    assert_eq!(stats["total_questions"], 4);
    assert_eq!(stats["total_cost"], 1.5);
    assert_eq!(stats["cost_by_provider"]["gemini"]["sessions"], 1);
    assert_eq!(stats["cost_by_model"]["gpt-4o-mini"]["total_cost"], 0.75);
}

#[tokio::test]
async fn csv_export_is_an_escaped_attachment() {
    let app = app(state());
    let (token, _) = register(&app, "csv@example.com").await;
    let saved = save(&app, &token, answer_session("Launch, \"v2\"")).await;
    save(&app, &token, answer_session("other")).await;

    let reply = get(&app, &format!("/api/export/csv?session_ids={}", saved["id"].as_str().unwrap()), &token).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert!(reply.headers[header::CONTENT_DISPOSITION].to_str().unwrap().starts_with("attachment"));

    let text = reply.text();
    assert!(text.starts_with(
        "session_id,session_name,session_type,provider,model,question,answer,input_tokens,output_tokens,cost,accuracy,created_at"
    ));
    assert!(text.contains("\"Launch, \"\"v2\"\"\""));
    assert!(text.contains("\"Globex, and \"\"Initech\"\"\nsometimes.\""));
    assert!(!text.contains("other"));

    let everything = get(&app, "/api/export/csv", &token).await.text();
    assert!(everything.contains("other"));

    let bad = get(&app, "/api/export/csv?session_ids=not-a-uuid", &token).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
