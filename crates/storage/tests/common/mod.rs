pub mod minio;

#[allow(unused_imports)]
pub use minio::{MinioContext, should_skip_s3_tests};
