//! The agent proper: planning, implementation, batching, conversation, and
//! the autonomous follow-up loop.

pub mod batch;
pub mod chat;
pub mod followup;
pub mod implementer;
pub mod planner;
pub mod prompt;

pub use batch::BatchRunner;
pub use chat::ConversationEngine;
pub use followup::AutonomousFollowUp;
pub use implementer::TaskImplementer;
pub use planner::TaskPlanner;
