//! services/api/src/adapters/store_contract.rs
//!
//! Behaviour every `DatabaseService` adapter must share. Each adapter's test module
//! runs these against its own backend.

use chrono::{Duration, Utc};
use genfuze_core::domain::{QAData, Session, SessionStatistics, SessionType, User, UserSession};
use genfuze_core::ports::{DatabaseService, PortError};
use uuid::Uuid;

fn session_for(user_id: Uuid, session_type: SessionType, name: &str, age_secs: i64) -> Session {
    Session {
        id: Uuid::new_v4(),
        user_id,
        session_type,
        name: name.to_string(),
        provider: "openai".to_string(),
        model: "gpt-4o-mini".to_string(),
        source_urls: vec!["https://example.com/post".to_string()],
        blog_content: Some("Body text".to_string()),
        qa_data: vec![QAData {
            question: "What is GEO?".to_string(),
            ..QAData::default()
        }],
        statistics: SessionStatistics::default(),
        created_at: Utc::now() - Duration::seconds(age_secs),
    }
}

pub async fn user_lifecycle(db: &dyn DatabaseService) {
    let user = db
        .create_user(User::new("Owner@Example.com", Some("hash".into()), Some("Owner".into())))
        .await
        .unwrap();
    assert_eq!(user.email, "owner@example.com");

    let duplicate = db.create_user(User::new("owner@example.com", None, None)).await;
    assert!(matches!(duplicate, Err(PortError::Conflict(_))));

    let by_email = db.get_user_by_email("OWNER@example.com").await.unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.password_hash.as_deref(), Some("hash"));
    assert_eq!(by_email.roles, vec!["user".to_string()]);

    let by_id = db.get_user_by_id(user.id).await.unwrap();
    assert_eq!(by_id.name.as_deref(), Some("Owner"));
    assert!(by_id.last_login_at.is_none());

    db.touch_last_login(user.id, Utc::now()).await.unwrap();
    assert!(db.get_user_by_id(user.id).await.unwrap().last_login_at.is_some());

    assert!(matches!(
        db.get_user_by_email("nobody@example.com").await,
        Err(PortError::NotFound(_))
    ));
}

pub async fn refresh_tokens(db: &dyn DatabaseService) {
    let user = db.create_user(User::new("tokens@example.com", None, None)).await.unwrap();
    let now = Utc::now();
    let live = UserSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        token: "live-token".to_string(),
        expires_at: now + Duration::days(7),
        created_at: now,
    };
    let stale = UserSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        token: "stale-token".to_string(),
        expires_at: now - Duration::minutes(1),
        created_at: now - Duration::days(8),
    };
    db.create_user_session(live.clone()).await.unwrap();
    db.create_user_session(stale).await.unwrap();

    let fetched = db.get_user_session("live-token").await.unwrap();
    assert_eq!(fetched.user_id, user.id);

    assert_eq!(db.delete_expired_user_sessions(now).await.unwrap(), 1);
    assert!(matches!(
        db.get_user_session("stale-token").await,
        Err(PortError::NotFound(_))
    ));

    db.delete_user_session("live-token").await.unwrap();
    db.delete_user_session("live-token").await.unwrap();
    assert!(db.get_user_session("live-token").await.is_err());
}

pub async fn session_ownership(db: &dyn DatabaseService) {
    let owner = db.create_user(User::new("a@example.com", None, None)).await.unwrap();
    let stranger = db.create_user(User::new("b@example.com", None, None)).await.unwrap();

    let older = session_for(owner.id, SessionType::Question, "older", 120);
    let newer = session_for(owner.id, SessionType::Answer, "newer", 10);
    db.save_session(older.clone()).await.unwrap();
    db.save_session(newer.clone()).await.unwrap();

    let listed = db.list_sessions(owner.id, None).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["newer", "older"]);

    let answers = db
        .list_sessions(owner.id, Some(SessionType::Answer))
        .await
        .unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].id, newer.id);

    assert!(matches!(
        db.get_session(older.id, stranger.id).await,
        Err(PortError::NotFound(_))
    ));
    assert!(db.list_sessions(stranger.id, None).await.unwrap().is_empty());
    assert!(!db.delete_session(older.id, stranger.id).await.unwrap());

    assert!(db.delete_session(older.id, owner.id).await.unwrap());
    assert!(!db.delete_session(older.id, owner.id).await.unwrap());
    assert!(db.get_session(older.id, owner.id).await.is_err());
}

pub async fn qa_round_trip(db: &dyn DatabaseService) {
    let owner = db.create_user(User::new("qa@example.com", None, None)).await.unwrap();
    let mut session = session_for(owner.id, SessionType::Answer, "answers", 0);
    session.qa_data = (0..3)
        .map(|i| QAData {
            question: format!("Question {}", i),
            answer: format!("Answer {}", i),
            input_tokens: 10 + i,
            output_tokens: 20 + i,
            cost: 0.001,
            accuracy: Some(87.5),
            question_embedding: Some(vec![0.25, -0.5, 1.0]),
            answer_embedding: None,
            geo_score: Some(60.0),
        })
        .collect();
    session.statistics.question_count = 3;
    db.save_session(session.clone()).await.unwrap();

    let loaded = db.get_session(session.id, owner.id).await.unwrap();
    assert_eq!(loaded.qa_data, session.qa_data);
    assert_eq!(loaded.source_urls, session.source_urls);
    assert_eq!(loaded.blog_content, session.blog_content);
    assert_eq!(loaded.statistics.question_count, 3);
}
