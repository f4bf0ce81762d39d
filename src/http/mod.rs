pub mod client;

pub use client::{EsiClient, FetchBody, FetchResponse, PageInfo};
