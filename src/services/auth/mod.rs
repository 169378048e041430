pub mod credential;
pub mod enrich;
pub mod identity;
pub mod token;
