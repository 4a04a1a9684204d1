pub mod client;
pub mod template;

pub use client::{DynamicCredentials, VaultClient, VaultError, VaultResult};
pub use template::{TemplateError, render};
