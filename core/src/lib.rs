pub mod config;
pub mod error;
pub mod input;
pub mod model;
pub mod repository;
pub mod service;
pub mod session;
pub mod time;

pub use config::ClientConfig;
pub use error::{RepositoryError, StoreError, ValidationError};
pub use input::{expand_key, parse_args, parse_new_task, ParsedInput};
pub use model::filter::FilterMode;
pub use model::task::{NewTask, Task, TaskId, TaskPatch};
pub use model::user::User;
pub use repository::{HttpTaskRepository, TaskRepository};
pub use service::projector::{counts, project, FilterCounts, ViewQuery};
pub use service::task_store::{StorePhase, StoreSnapshot, TaskStore};
pub use session::{FileSessionProvider, SessionProvider};
pub use time::{format_server_date, parse_server_date};
