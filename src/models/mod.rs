pub mod category;
pub mod chatbot_fallback_response;
pub mod chatbot_feedback;
pub mod chatbot_query;
pub mod item;
pub mod item_lifecycle_event;
pub mod maintenance_request;
pub mod notification;
pub mod purchase_request;
pub mod role;
pub mod transaction;
pub mod user;
pub mod vendor;
