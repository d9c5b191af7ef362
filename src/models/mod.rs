pub mod application;
pub mod email_notification;
pub mod recruiter_note;
pub mod stage;
pub mod stage_transition;
