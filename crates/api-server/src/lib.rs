#![warn(clippy::unwrap_used)]

pub mod batch;
pub mod repository;
pub mod responses_rest;
pub mod rest;
pub mod server;
pub mod session_rest;
pub mod store;
pub mod swagger;

pub use batch::{BatchPersistenceHandler, BatchReport, ItemOutcome};
pub use repository::SurveyRepository;
pub use rest::AppState;
pub use server::{router, ApiServer};
pub use store::{InMemoryResponseStore, PersistenceError, ResponseStore, StoredResponse};
pub use swagger::ApiDoc;
