pub mod auth;
pub mod models;
pub mod pager;
pub mod rest;

pub use models::*;
pub use pager::{PageSource, Pager};
pub use rest::{GithubClient, GithubSource};
