//! Upload pipeline: gate, multipart decoding, content sniffing and the
//! streaming store writer.

pub mod gate;
pub mod multipart;
pub mod sniff;
pub mod writer;

pub use multipart::{decode_file_upload, decode_wallet_upload, SpooledFile};
pub use sniff::{sniff_upload, MimePolicy, SniffedReader};
pub use writer::{CountingReader, PendingObject, StoreWriter, StoredObject};
