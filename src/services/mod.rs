//! Domain services: object store access, bucket provisioning, upload
//! brokering and the generation history ledger.

pub mod bucket_provisioner;
pub mod history_service;
pub mod object_store;
pub mod upload_service;
