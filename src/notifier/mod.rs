mod client;

pub use client::NotifierClient;
