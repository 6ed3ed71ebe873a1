/// Notification fan-out for state changes
///
/// Handlers call the [`Notifier`] after their write has committed. Every
/// configured publisher gets one attempt; failures are logged and swallowed,
/// so a lost notification never fails or rolls back the request. Clients
/// treat events as hints and re-read state from the API.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::channel::{Channel, RealtimeEvent, EVENT_NEW_COMMENT, EVENT_NEW_TASK};
use super::publisher::EventPublisher;
use crate::models::comment::CommentWithAuthor;
use crate::models::task::Task;

#[derive(Clone, Default)]
pub struct Notifier {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl Notifier {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Sends `event` through every publisher
    ///
    /// # Returns
    ///
    /// Number of publishers that accepted the event
    pub async fn publish(&self, event: RealtimeEvent) -> usize {
        let mut accepted = 0;

        for publisher in &self.publishers {
            match publisher.publish(&event).await {
                Ok(()) => accepted += 1,
                Err(e) => tracing::warn!(
                    publisher = publisher.name(),
                    channel = %event.channel,
                    event = %event.event,
                    error = %e,
                    "Realtime notification dropped"
                ),
            }
        }

        accepted
    }

    /// A comment was posted: every member of the project hears about it
    pub async fn comment_created(&self, project_id: Uuid, comment: &CommentWithAuthor) -> usize {
        let data = match serde_json::to_value(comment) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode comment notification");
                return 0;
            }
        };

        self.publish(RealtimeEvent::new(
            Channel::Project(project_id),
            EVENT_NEW_COMMENT,
            data,
        ))
        .await
    }

    /// A task was assigned: only the assignee hears about it
    pub async fn task_assigned(&self, assignee_id: Uuid, assigned_by: &str, task: &Task) -> usize {
        self.publish(RealtimeEvent::new(
            Channel::User(assignee_id),
            EVENT_NEW_TASK,
            json!({
                "message": assignment_message(assigned_by, &task.title),
                "task_id": task.id,
                "project_id": task.project_id,
            }),
        ))
        .await
    }
}

/// Toast text shown to the assignee
pub fn assignment_message(assigned_by: &str, title: &str) -> String {
    format!("{} assigned you a new task: \"{}\"", assigned_by, title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::{Attachment, Comment};
    use crate::models::task::{TaskPriority, TaskStatus};
    use crate::realtime::hub::LocalHub;
    use crate::realtime::publisher::PublishError;
    use async_trait::async_trait;
    use chrono::Utc;
    use sqlx::types::Json;

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn publish(&self, _event: &RealtimeEvent) -> Result<(), PublishError> {
            Err(PublishError::Transport("connection refused".to_string()))
        }
    }

    fn comment(task_id: Uuid) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: Comment {
                id: Uuid::new_v4(),
                task_id,
                author_id: Uuid::new_v4(),
                text: "Looks good".to_string(),
                attachments: Json(vec![Attachment {
                    url: "https://files.example.com/mockup.pdf".to_string(),
                    filename: "mockup.pdf".to_string(),
                }]),
                created_at: Utc::now(),
            },
            author_name: "Ada".to_string(),
            author_image_url: None,
        }
    }

    fn task(project_id: Uuid) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id,
            title: "Ship it".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::High,
            due_date: None,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_comment_reaches_only_its_project_channel() {
        let hub = LocalHub::default();
        let notifier = Notifier::default().with_publisher(Arc::new(hub.clone()));

        let project = Uuid::new_v4();
        let other_project = Uuid::new_v4();
        let member = Uuid::new_v4();

        let mut project_rx = hub.subscribe(Channel::Project(project)).await;
        let mut other_rx = hub.subscribe(Channel::Project(other_project)).await;
        let mut user_rx = hub.subscribe(Channel::User(member)).await;

        let posted = comment(Uuid::new_v4());
        notifier.comment_created(project, &posted).await;

        let event = project_rx.try_recv().unwrap();
        assert_eq!(event.event, EVENT_NEW_COMMENT);
        assert_eq!(event.data["text"], "Looks good");
        assert_eq!(event.data["author_name"], "Ada");

        assert!(other_rx.try_recv().is_err());
        assert!(user_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_assignment_reaches_only_the_assignee() {
        let hub = LocalHub::default();
        let notifier = Notifier::default().with_publisher(Arc::new(hub.clone()));

        let project = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let bystander = Uuid::new_v4();

        let mut assignee_rx = hub.subscribe(Channel::User(assignee)).await;
        let mut bystander_rx = hub.subscribe(Channel::User(bystander)).await;
        let mut project_rx = hub.subscribe(Channel::Project(project)).await;

        notifier.task_assigned(assignee, "Grace", &task(project)).await;

        let event = assignee_rx.try_recv().unwrap();
        assert_eq!(event.event, EVENT_NEW_TASK);
        assert_eq!(event.data["message"], "Grace assigned you a new task: \"Ship it\"");

        assert!(bystander_rx.try_recv().is_err());
        assert!(project_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_publisher_does_not_block_others() {
        let hub = LocalHub::default();
        let notifier = Notifier::new(vec![Arc::new(FailingPublisher), Arc::new(hub.clone())]);

        let channel = Channel::User(Uuid::new_v4());
        let mut rx = hub.subscribe(channel).await;

        let accepted = notifier
            .publish(RealtimeEvent::new(channel, "new-task", json!({})))
            .await;

        assert_eq!(accepted, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_notifier_without_publishers() {
        let accepted = Notifier::default()
            .publish(RealtimeEvent::new(Channel::User(Uuid::new_v4()), "new-task", json!({})))
            .await;
        assert_eq!(accepted, 0);
    }
}
