mod common;

use axum::http::StatusCode;
use common::{RecordingNotifier, TestApp};
use serde_json::Value;

/// Alice with one active group wired to a texted template, holding two
/// reachable recipients (chats 1001 and 1002, both opted in) and one without
/// a telegram id.
async fn seeded(app: &TestApp) -> String {
    let token = app.signup("alice").await;
    let t = app
        .create_confirmed("templates", &token, r#"{"name":"t","message_text":"Shelter in place"}"#)
        .await;
    let t = t["notification_template_id"].as_str().unwrap().to_string();
    let g = app
        .create_confirmed(
            "groups",
            &token,
            &format!(r#"{{"name":"g","active":true,"notification_template_id":"{t}"}}"#),
        )
        .await;
    let g = g["recipient_group_id"].as_str().unwrap().to_string();

    for body in [
        r#"{"name":"a","telegram_id":1001}"#,
        r#"{"name":"b","telegram_id":1002}"#,
        r#"{"name":"c","email":"c@example.com"}"#,
    ] {
        let r = app.create_confirmed("recipients", &token, body).await;
        let r = r["recipient_id"].as_str().unwrap();
        let reply = app
            .put(&format!("/groups/addRecipient?group_id={g}&recipient_id={r}"), &token, None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    for chat in [1001, 1002] {
        app.state.db.activate_contact(chat).unwrap();
    }
    token
}

async fn new_batch(app: &TestApp, token: &str) -> String {
    let reply = app.post("/notifications/createBatch", Some(token), "").await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.str("batch_id")
}

#[tokio::test]
async fn send_batch_delivers_to_reachable_members() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let batch = new_batch(&app, &token).await;

    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body.as_array().unwrap().len(), 2);

    let mut chats: Vec<i64> = app.notifier.sent().into_iter().map(|(chat, _)| chat).collect();
    chats.sort();
    assert_eq!(chats, [1001, 1002]);
    assert!(app.notifier.sent().iter().all(|(_, text)| text == "Shelter in place"));

    let all = app.get("/notifications/all", &token).await;
    let all = all.body.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|n| n["type"] == "telegram" && n["completion_timestamp"].is_string()));

    let pending = app.get("/notifications/pending", &token).await;
    assert_eq!(pending.body, serde_json::json!([]));
}

#[tokio::test]
async fn batch_is_sent_at_most_once() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let batch = new_batch(&app, &token).await;
    let uri = format!("/notifications/sendBatch?batch_id={batch}");

    assert_eq!(app.put(&uri, &token, None).await.status, StatusCode::OK);
    assert_eq!(app.put(&uri, &token, None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.count("notification"), 2);
}

#[tokio::test]
async fn unknown_or_foreign_batch_is_not_found() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let bob = app.signup("bob").await;
    let batch = new_batch(&app, &token).await;

    for (uri, who) in [
        ("/notifications/sendBatch".to_string(), &token),
        ("/notifications/sendBatch?batch_id=zzz".to_string(), &token),
        (format!("/notifications/sendBatch?batch_id={batch}"), &bob),
    ] {
        assert_eq!(app.put(&uri, who, None).await.status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert_eq!(app.count("notification"), 0);
}

#[tokio::test]
async fn failed_delivery_stays_pending_and_can_be_cancelled() {
    let app = TestApp::with_notifier(RecordingNotifier {
        failing: vec![1002],
        ..Default::default()
    });
    let token = seeded(&app).await;
    let batch = new_batch(&app, &token).await;
    app.put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;

    let pending = app.get("/notifications/pending", &token).await;
    let pending = pending.body.as_array().unwrap().clone();
    assert_eq!(pending.len(), 1);
    assert!(pending[0]["completion_timestamp"].is_null());
    let pending_id = pending[0]["notification_id"].as_str().unwrap().to_string();

    let one = app.get(&format!("/notifications?notification_id={pending_id}"), &token).await;
    assert_eq!(one.status, StatusCode::OK);
    assert_eq!(one.body["batch_id"], batch.as_str());

    let bob = app.signup("bob").await;
    let uri = format!("/notifications/cancelNotification?notification_id={pending_id}");
    assert_eq!(app.delete(&uri, &bob).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, &token).await.status, StatusCode::OK);
    assert_eq!(app.delete(&uri, &token).await.status, StatusCode::NOT_FOUND);

    let all = app.get("/notifications/all", &token).await;
    assert_eq!(all.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delivered_notification_cannot_be_cancelled() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let batch = new_batch(&app, &token).await;
    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    let id = sent.body[0].as_str().unwrap().to_string();

    let reply = app
        .delete(&format!("/notifications/cancelNotification?notification_id={id}"), &token)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notifications_are_scoped_to_owner() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let bob = app.signup("bob").await;
    let batch = new_batch(&app, &token).await;
    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    let id = sent.body[0].as_str().unwrap().to_string();

    let reply = app.get(&format!("/notifications?notification_id={id}"), &bob).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.get("notification_id").is_none());

    let listed = app.get("/notifications/all", &bob).await;
    assert_eq!(listed.body, Value::Array(vec![]));
}

#[tokio::test]
async fn inactive_group_sends_nothing() {
    let app = TestApp::new();
    let token = app.signup("alice").await;
    app.create_confirmed("groups", &token, r#"{"name":"quiet","active":false}"#)
        .await;
    let batch = new_batch(&app, &token).await;

    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body, Value::Array(vec![]));
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn members_without_opt_in_get_no_notification() {
    let app = TestApp::new();
    let token = seeded(&app).await;
    let g = app.get("/groups/active", &token).await.body[0]["recipient_group_id"]
        .as_str()
        .unwrap()
        .to_string();
    let r = app
        .create_confirmed("recipients", &token, r#"{"name":"d","telegram_id":1003}"#)
        .await;
    let r = r["recipient_id"].as_str().unwrap();
    app.put(&format!("/groups/addRecipient?group_id={g}&recipient_id={r}"), &token, None)
        .await;

    // 1003 never talked to the bot; 1002 opts out.
    let stop = app.bot_message(1002, "/stop_notifications").await;
    assert_eq!(stop.status, StatusCode::OK);

    let batch = new_batch(&app, &token).await;
    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body.as_array().unwrap().len(), 1);
    assert_eq!(app.notifier.chats_sent("Shelter in place"), [1001]);
    assert_eq!(app.count("notification"), 1);
}

#[tokio::test]
async fn lost_completion_does_not_stop_the_batch() {
    let app = TestApp::new();
    let token = seeded(&app).await;

    // Chat 1001's row disappears while its message is in flight.
    let state = app.state.clone();
    app.notifier.on_send(move |chat| {
        if chat == 1001 {
            state
                .db
                .with_conn(|c| {
                    c.execute(
                        "DELETE FROM notification WHERE recipient_id IN
                            (SELECT recipient_id FROM recipient WHERE telegram_id = ?1)",
                        [chat],
                    )?;
                    Ok(())
                })
                .unwrap();
        }
    });

    let batch = new_batch(&app, &token).await;
    let sent = app
        .put(&format!("/notifications/sendBatch?batch_id={batch}"), &token, None)
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body.as_array().unwrap().len(), 2);
    assert_eq!(app.notifier.chats_sent("Shelter in place"), [1001, 1002]);

    let all = app.get("/notifications/all", &token).await;
    let all = all.body.as_array().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0]["completion_timestamp"].is_string());
}
