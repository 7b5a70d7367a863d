//! Static service surface

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SERVICE: &str = "static";

pub const GET_STATIC: &str = "GetStatic";
pub const UPLOAD_STATIC: &str = "UploadStatic";
pub const GET_STATIC_FILE: &str = "GetStaticFile";

/// Size of each chunk streamed back by `GetStaticFile`
pub const FILE_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticId {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUri {
    pub uri: String,
}
