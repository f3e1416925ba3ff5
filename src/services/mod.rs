// Document numbering and transactional writes
pub mod document_writer;
pub mod numbering;

// Business records
pub mod assets;
pub mod counterparties;
pub mod documents;

// Files and external lookups
pub mod attachments;
pub mod vehicles;
