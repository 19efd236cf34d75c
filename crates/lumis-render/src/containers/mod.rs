pub mod mesh_container;
pub mod storage_container;
pub mod texture_container;
