#![allow(dead_code)]

pub mod memory_store;
#[path = "../../../storage/tests/common/minio.rs"]
pub mod minio;
pub mod mock_uploader;

#[allow(unused_imports)]
pub use memory_store::MemoryStore;
#[allow(unused_imports)]
pub use minio::{MinioContext, should_skip_s3_tests};
#[allow(unused_imports)]
pub use mock_uploader::{Behavior, MockUploader};

use std::net::TcpListener;

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}
