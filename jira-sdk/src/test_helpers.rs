// ABOUTME: Test helper utilities for mocking Jira REST responses and server
// ABOUTME: Provides mockito-based helpers for unit testing API interactions

use mockito::{Server, ServerGuard};
use serde_json::{Value, json};

pub async fn mock_jira_server() -> ServerGuard {
    Server::new_async().await
}

pub fn mock_search_page(keys: &[&str], next_page_token: Option<&str>) -> Value {
    let issues: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "id": format!("id-{key}"),
                "key": key,
                "fields": {
                    "summary": format!("Summary of {key}"),
                    "status": {"name": "To Do"},
                    "labels": []
                }
            })
        })
        .collect();

    match next_page_token {
        Some(token) => json!({ "issues": issues, "nextPageToken": token, "isLast": false }),
        None => json!({ "issues": issues, "isLast": true }),
    }
}

pub fn mock_fields_response() -> Value {
    json!([
        {"id": "summary", "name": "Summary", "custom": false, "schema": {"type": "string"}},
        {"id": "priority", "name": "Priority", "custom": false, "schema": {"type": "priority"}},
        {"id": "customfield_10016", "name": "Story Points", "custom": true, "schema": {"type": "number"}}
    ])
}

pub fn mock_transitions_response() -> Value {
    json!({
        "transitions": [
            {"id": "11", "name": "To Do", "to": {"name": "To Do"}},
            {"id": "21", "name": "In Progress", "to": {"name": "In Progress"}},
            {"id": "31", "name": "Done", "to": {"name": "Done"}}
        ]
    })
}

pub fn mock_error_body(message: &str) -> Value {
    json!({ "errorMessages": [message], "errors": {} })
}
