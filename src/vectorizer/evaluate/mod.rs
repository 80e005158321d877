pub mod boolean;
pub mod dnf;
pub mod extended;
pub mod query;
pub mod scoring;
pub mod vector;
