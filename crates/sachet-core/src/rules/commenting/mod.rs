//! Commenting rules

mod all_caps_comment;
mod todo_comment;

pub use all_caps_comment::AllCapsCommentRule;
pub use todo_comment::TodoCommentRule;
