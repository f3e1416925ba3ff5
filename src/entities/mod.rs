pub mod asset;
pub mod attachment;
pub mod counterparty;
pub mod document;
pub mod document_item;
pub mod vehicle;
