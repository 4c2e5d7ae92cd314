pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, HostError};
pub use events::{EventBus, HostEvent, ParsedEvent, QuestionSource};
pub use id::{new_id, SessionId};

pub type Result<T> = std::result::Result<T, HostError>;
