//! Contact capture — `record_user_details`.
//!
//! A visitor who wants a follow-up leaves an email address. The record goes
//! to a [`ContactStore`] and the caller gets a confirmation token back.

use async_trait::async_trait;
use careerchat_core::error::ToolError;
use careerchat_core::tool::{ToolCall, ToolKind, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// A captured contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Confirmation token handed back to the responder
    pub token: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Where contact records are persisted.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Persist a record; returns the confirmation token.
    async fn save(&self, record: ContactRecord) -> Result<String, ToolError>;
}

/// Appends one JSON object per line to a file.
pub struct FileContactStore {
    path: PathBuf,
    // Serializes appends from concurrent sessions
    write_lock: tokio::sync::Mutex<()>,
}

impl FileContactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ContactStore for FileContactStore {
    async fn save(&self, record: ContactRecord) -> Result<String, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: ToolKind::Contact.name().into(),
            reason,
        };

        let mut line = serde_json::to_string(&record).map_err(|e| failed(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("cannot create {}: {e}", parent.display())))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| failed(format!("cannot open {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| failed(e.to_string()))?;
        file.flush().await.map_err(|e| failed(e.to_string()))?;

        Ok(record.token)
    }
}

/// Keeps records in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryContactStore {
    records: Mutex<Vec<ContactRecord>>,
}

impl MemoryContactStore {
    pub fn records(&self) -> Vec<ContactRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn save(&self, record: ContactRecord) -> Result<String, ToolError> {
        let token = record.token.clone();
        self.records
            .lock()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: ToolKind::Contact.name().into(),
                reason: e.to_string(),
            })?
            .push(record);
        Ok(token)
    }
}

pub struct ContactTool {
    store: Arc<dyn ContactStore>,
}

impl ContactTool {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let text = |key: &str| {
            call.arguments
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let email = text("email").unwrap_or_default();
        if !looks_like_email(&email) {
            return Err(ToolError::InvalidArguments {
                tool_name: ToolKind::Contact.name().into(),
                reason: format!("'{email}' is not an email address"),
            });
        }

        let record = ContactRecord {
            token: uuid::Uuid::new_v4().to_string(),
            email,
            name: text("name"),
            notes: text("notes"),
            recorded_at: Utc::now(),
        };

        let token = self.store.save(record).await?;
        info!(token = %token, "Contact details recorded");

        Ok(ToolResult::success(
            call,
            "Contact details recorded. Let the user know they will be contacted.",
            Some(serde_json::json!({ "recorded": true, "token": token })),
        ))
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !s.contains(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: "record_user_details".into(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn records_contact_and_returns_token() {
        let store = Arc::new(MemoryContactStore::default());
        let tool = ContactTool::new(store.clone());

        let result = tool
            .execute(&call(json!({"email": "visitor@example.com", "name": "Sam", "notes": " "})))
            .await
            .unwrap();

        assert!(result.succeeded);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Sam"));
        assert_eq!(records[0].notes, None);
        assert_eq!(result.data.unwrap()["token"], records[0].token);
    }

    #[tokio::test]
    async fn rejects_non_email() {
        let tool = ContactTool::new(Arc::new(MemoryContactStore::default()));
        let err = tool.execute(&call(json!({"email": "not-an-email"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn file_store_appends_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("contacts.jsonl");
        let tool = ContactTool::new(Arc::new(FileContactStore::new(&path)));

        tool.execute(&call(json!({"email": "a@example.com"}))).await.unwrap();
        tool.execute(&call(json!({"email": "b@example.com"}))).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<ContactRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].email, "b@example.com");
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.com"));
        assert!(!looks_like_email("a b@c.com"));
    }
}
