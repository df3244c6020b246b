pub mod account;
pub mod client;
pub mod evaluation;

pub use account::AccountService;
pub use client::ClientService;
pub use evaluation::EvaluationService;
