pub mod store;
pub mod supabase;

pub use store::{Backend, BackendError, BlobStore, IdentityProvider, RecordStore, UploadOptions};
pub use supabase::SupabaseClient;
