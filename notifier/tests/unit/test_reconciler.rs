//! Reconciler tests

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nomad_models::{Deployment, DeploymentState};
use notifier::errors::NotifierError;
use notifier::notify::reconciler::Reconciler;
use notifier::notify::render::{COLOR_RUNNING, MANUAL_PROMOTION_DESCRIPTION};
use notifier::slack::client::{ChatApi, MessageHandle};
use slack_models::Attachment;

#[derive(Debug, Clone)]
enum Call {
    Post {
        channel: String,
        attachments: Vec<Attachment>,
    },
    Update {
        channel: String,
        handle: MessageHandle,
        attachments: Vec<Attachment>,
    },
}

/// Chat double recording every call
#[derive(Default)]
struct RecordingChat {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    next_ts: AtomicU64,
    rotate_on_update: bool,
}

impl RecordingChat {
    fn rotating() -> Self {
        Self {
            rotate_on_update: true,
            ..Default::default()
        }
    }

    fn fail_for(&self, deployment_id: &str) {
        self.failing.lock().unwrap().insert(deployment_id.to_string());
    }

    fn recover(&self, deployment_id: &str) {
        self.failing.lock().unwrap().remove(deployment_id);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn posts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Post { .. }))
            .count()
    }

    fn updates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Update { .. }))
            .count()
    }

    fn check(&self, attachments: &[Attachment]) -> Result<(), NotifierError> {
        let id = &attachments[0].callback_id;
        if self.failing.lock().unwrap().contains(id) {
            return Err(NotifierError::SlackError("not_authed".to_string()));
        }
        Ok(())
    }

    fn new_ts(&self) -> String {
        format!("1700000000.{:06}", self.next_ts.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn post_message(
        &self,
        channel: &str,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError> {
        tokio::task::yield_now().await;
        self.check(attachments)?;
        self.calls.lock().unwrap().push(Call::Post {
            channel: channel.to_string(),
            attachments: attachments.to_vec(),
        });
        Ok(MessageHandle(self.new_ts()))
    }

    async fn update_message(
        &self,
        channel: &str,
        handle: &MessageHandle,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError> {
        tokio::task::yield_now().await;
        self.check(attachments)?;
        self.calls.lock().unwrap().push(Call::Update {
            channel: channel.to_string(),
            handle: handle.clone(),
            attachments: attachments.to_vec(),
        });
        if self.rotate_on_update {
            Ok(MessageHandle(self.new_ts()))
        } else {
            Ok(handle.clone())
        }
    }
}

fn deployment(id: &str, status: &str, description: &str) -> Deployment {
    let mut task_groups = BTreeMap::new();
    task_groups.insert(
        "web".to_string(),
        DeploymentState {
            healthy_allocs: 2,
            placed_allocs: 2,
            desired_canaries: 0,
            ..Default::default()
        },
    );
    Deployment {
        id: id.to_string(),
        job_id: "frontend".to_string(),
        status: status.to_string(),
        status_description: description.to_string(),
        task_groups,
        ..Default::default()
    }
}

fn reconciler(chat: Arc<RecordingChat>) -> Reconciler {
    Reconciler::new(chat, "C0DEPLOY".to_string(), "http://nomad:4646".to_string())
}

#[tokio::test]
async fn test_first_sighting_posts() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = reconciler(chat.clone());

    reconciler
        .handle(&deployment("d1", "running", "Deployment is running"))
        .await
        .unwrap();

    assert_eq!(chat.posts(), 1);
    assert_eq!(chat.updates(), 0);
    assert!(reconciler.message_handle("d1").await.is_some());
    match &chat.calls()[0] {
        Call::Post { channel, .. } => assert_eq!(channel, "C0DEPLOY"),
        other => panic!("expected a post, got {:?}", other),
    }
}

#[tokio::test]
async fn test_known_deployment_edits_stored_handle() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = reconciler(chat.clone());

    reconciler
        .handle(&deployment("d1", "running", "Deployment is running"))
        .await
        .unwrap();
    let stored = reconciler.message_handle("d1").await.unwrap();

    reconciler
        .handle(&deployment("d1", "successful", "Deployment completed successfully"))
        .await
        .unwrap();

    assert_eq!(chat.posts(), 1);
    match &chat.calls()[1] {
        Call::Update { handle, channel, .. } => {
            assert_eq!(handle, &stored);
            assert_eq!(channel, "C0DEPLOY");
        }
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_single_writer_per_deployment() {
    for n in 1..=5 {
        let chat = Arc::new(RecordingChat::default());
        let reconciler = reconciler(chat.clone());

        for _ in 0..n {
            reconciler
                .handle(&deployment("d1", "running", "Deployment is running"))
                .await
                .unwrap();
        }

        assert_eq!(chat.posts(), 1);
        assert_eq!(chat.updates(), n - 1);
        assert_eq!(reconciler.tracked().await, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_snapshots_post_once() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = Arc::new(reconciler(chat.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reconciler = reconciler.clone();
        handles.push(tokio::spawn(async move {
            reconciler
                .handle(&deployment("d1", "running", "Deployment is running"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(chat.posts(), 1);
    assert_eq!(chat.updates(), 7);
}

#[tokio::test]
async fn test_refreshed_handle_is_stored() {
    let chat = Arc::new(RecordingChat::rotating());
    let reconciler = reconciler(chat.clone());
    let event = deployment("d1", "running", "Deployment is running");

    reconciler.handle(&event).await.unwrap();
    reconciler.handle(&event).await.unwrap();
    let refreshed = reconciler.message_handle("d1").await.unwrap();
    reconciler.handle(&event).await.unwrap();

    match &chat.calls()[2] {
        Call::Update { handle, .. } => assert_eq!(handle, &refreshed),
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_post_isolated_and_retried() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = reconciler(chat.clone());
    chat.fail_for("a");

    let err = reconciler
        .handle(&deployment("a", "running", "Deployment is running"))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifierError::SlackError(_)));
    assert!(reconciler.message_handle("a").await.is_none());

    reconciler
        .handle(&deployment("b", "running", "Deployment is running"))
        .await
        .unwrap();
    assert!(reconciler.message_handle("b").await.is_some());
    assert_eq!(chat.posts(), 1);

    // The next snapshot of `a` is a create again
    chat.recover("a");
    reconciler
        .handle(&deployment("a", "running", "Deployment is running"))
        .await
        .unwrap();
    assert_eq!(chat.posts(), 2);
    assert_eq!(chat.updates(), 0);
}

#[tokio::test]
async fn test_failed_edit_keeps_handle() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = reconciler(chat.clone());
    let event = deployment("d1", "running", "Deployment is running");

    reconciler.handle(&event).await.unwrap();
    let stored = reconciler.message_handle("d1").await.unwrap();

    chat.fail_for("d1");
    tokio_test::assert_err!(reconciler.handle(&event).await);
    assert_eq!(reconciler.message_handle("d1").await, Some(stored.clone()));

    chat.recover("d1");
    reconciler.handle(&event).await.unwrap();
    match chat.calls().last() {
        Some(Call::Update { handle, .. }) => assert_eq!(handle, &stored),
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_running_then_awaiting_promotion() {
    let chat = Arc::new(RecordingChat::default());
    let reconciler = reconciler(chat.clone());

    reconciler
        .handle(&deployment("d1", "running", "Deployment is running"))
        .await
        .unwrap();
    reconciler
        .handle(&deployment("d1", "running", MANUAL_PROMOTION_DESCRIPTION))
        .await
        .unwrap();

    let calls = chat.calls();
    assert_eq!(calls.len(), 2);

    let posted = match &calls[0] {
        Call::Post { attachments, .. } => {
            let attachment = &attachments[0];
            assert_eq!(attachment.color, COLOR_RUNNING);
            assert!(attachment.actions.is_empty());
            assert_eq!(attachment.fields.len(), 1);
            assert_eq!(attachment.fields[0].title, "Task Group: web");
            assert_eq!(attachment.fields[0].value, "Healthy: 2, 配置数: 2, カナリア: 0");
            reconciler.message_handle("d1").await.unwrap()
        }
        other => panic!("expected a post, got {:?}", other),
    };

    match &calls[1] {
        Call::Update {
            handle,
            attachments,
            ..
        } => {
            assert_eq!(handle, &posted);
            assert_eq!(attachments[0].actions.len(), 2);
        }
        other => panic!("expected an update, got {:?}", other),
    }
}
