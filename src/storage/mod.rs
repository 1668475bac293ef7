pub mod client;
pub mod path;
pub mod photos;

pub use client::{ObjectStore, StoreError, SupabaseStorage};
pub use path::{StoragePathInfo, build_public_url, build_upload_path, resolve_public_url};
pub use photos::{DeletionOutcome, PhotoUpload, UploadError, delete_photo, upload_photos};
