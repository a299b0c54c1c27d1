pub mod health;
pub mod poll_images;
pub mod wallet_documents;
pub mod wallet_files;
pub mod wallet_upload;
