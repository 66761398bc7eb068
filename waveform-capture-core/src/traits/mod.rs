pub mod capture_provider;
pub mod session_observer;
