pub mod conversion_service;
pub mod fallback;
pub mod pulse_service;
pub mod rate_service;
pub mod synthetic;
pub mod validation;
