/// Notification delivery channels.
pub mod channels;
/// Invitation lists built from matching strategies.
pub mod invitation_service;
/// Caller-facing match lifecycle operations.
pub mod match_service;
/// Candidate matching strategies.
pub mod matching;
/// Match observer dispatching notifications.
pub mod notification_service;
/// Time-driven lifecycle transitions.
pub mod sweeper;
