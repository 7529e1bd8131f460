pub mod extra_bytes;
pub mod pointcloud;
