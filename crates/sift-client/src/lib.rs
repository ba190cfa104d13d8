mod client;
mod transport;

pub use client::{ClientError, HttpClient};
pub use transport::{Operation, Transport};
