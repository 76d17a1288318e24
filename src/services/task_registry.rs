use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::itinerary::GenerateItineraryRequest;
use crate::services::travel_service::{TravelError, TravelService};

/// How long finished tasks stay queryable.
const RESULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Progress(u8),
    Success(Value),
    Failure(String),
}

impl TaskState {
    fn is_finished(&self) -> bool {
        matches!(self, TaskState::Success(_) | TaskState::Failure(_))
    }
}

struct TaskEntry {
    state: TaskState,
    finished_at: Option<Instant>,
}

/// Wire shape of `GET /tasks/{task_id}/status`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    fn from_state(task_id: &str, state: TaskState) -> Self {
        let mut status = TaskStatus {
            task_id: task_id.to_string(),
            status: "pending",
            message: "任务等待中",
            progress: None,
            result: None,
            error: None,
        };
        match state {
            TaskState::Pending => {}
            TaskState::Progress(progress) => {
                status.status = "progress";
                status.message = "任务执行中";
                status.progress = Some(progress);
            }
            TaskState::Success(result) => {
                status.status = "success";
                status.message = "任务完成";
                status.result = Some(result);
            }
            TaskState::Failure(error) => {
                status.status = "failure";
                status.message = "任务失败";
                status.error = Some(error);
            }
        }
        status
    }
}

/// In-process registry of background jobs, keyed by UUID. Finished tasks are
/// dropped once they are older than the retention window.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskEntry>>,
    retention: Duration,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            retention: RESULT_RETENTION,
        }
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn set(&self, task_id: &str, state: TaskState) {
        let now = Instant::now();
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let before = tasks.len();
        tasks.retain(|_, entry| {
            entry
                .finished_at
                .map_or(true, |at| now.duration_since(at) < self.retention)
        });
        if tasks.len() < before {
            log::debug!("Pruned {} expired task results", before - tasks.len());
        }

        let finished_at = state.is_finished().then_some(now);
        tasks.insert(task_id.to_string(), TaskEntry { state, finished_at });
    }

    /// Ids that were never registered report `pending`.
    pub fn status(&self, task_id: &str) -> TaskStatus {
        let state = self
            .tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .map(|entry| entry.state.clone())
            .unwrap_or(TaskState::Pending);
        TaskStatus::from_state(task_id, state)
    }

    /// Registers a job and runs it on the current runtime. Returns the task id.
    /// A job that panics is reported as a failure.
    pub fn spawn<F>(self: &Arc<Self>, name: &'static str, job: F) -> String
    where
        F: Future<Output = Result<Value, TravelError>> + 'static,
    {
        let task_id = Uuid::new_v4().to_string();
        self.set(&task_id, TaskState::Pending);

        let registry = Arc::clone(self);
        let id = task_id.clone();
        actix_web::rt::spawn(async move {
            registry.set(&id, TaskState::Progress(0));
            match actix_web::rt::spawn(job).await {
                Ok(Ok(result)) => {
                    log::info!("Task {} ({}) finished", id, name);
                    registry.set(&id, TaskState::Success(result));
                }
                Ok(Err(e)) => {
                    log::error!("Task {} ({}) failed: {}", id, name, e);
                    registry.set(&id, TaskState::Failure(e.to_string()));
                }
                Err(e) => {
                    log::error!("Task {} ({}) aborted: {}", id, name, e);
                    registry.set(&id, TaskState::Failure(format!("task aborted: {}", e)));
                }
            }
        });

        task_id
    }

    pub fn spawn_generation(
        self: &Arc<Self>,
        service: Arc<TravelService>,
        plan_id: String,
        request: GenerateItineraryRequest,
    ) -> String {
        self.spawn("generate_travel_itinerary", async move {
            let result = service.generate_itinerary(&plan_id, &request).await?;
            serde_json::to_value(result).map_err(|e| TravelError::Task(e.to_string()))
        })
    }

    pub fn spawn_attraction_fetch(
        self: &Arc<Self>,
        service: Arc<TravelService>,
        city: String,
        keyword: Option<String>,
    ) -> String {
        self.spawn("fetch_attractions", async move {
            service.fetch_attractions(&city, keyword.as_deref()).await
        })
    }

    pub fn spawn_restaurant_fetch(
        self: &Arc<Self>,
        service: Arc<TravelService>,
        city: String,
        cuisine_type: Option<String>,
    ) -> String {
        self.spawn("fetch_restaurants", async move {
            service.fetch_restaurants(&city, cuisine_type.as_deref()).await
        })
    }
}
