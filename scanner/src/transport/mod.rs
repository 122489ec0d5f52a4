pub mod device;
pub mod fetch;
pub mod response;
pub mod ssdp;
