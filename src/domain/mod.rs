pub mod error;
pub mod event;
pub mod model;

pub use error::AppError;
pub use event::UpdateEvent;
pub use model::{
    DownloadRequest, InstallPackage, TaskHandle, TaskSnapshot, TaskStatus, UpdateDescriptor,
    NO_TASK, UNKNOWN_SIZE,
};
