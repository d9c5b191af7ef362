pub mod funnel_service;
pub mod notification_service;
pub mod pipeline_service;
pub mod timeline_service;
pub mod transition_validator;
