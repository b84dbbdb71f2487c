pub mod controller_service;
pub mod documentation;
pub mod health_service;
pub mod room_service;
pub mod sse_events;
pub mod sse_service;
