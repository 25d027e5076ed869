pub mod gateway_service;
pub mod key_generator;
pub mod metadata_enricher;
pub mod object_store_client;
pub mod remote_store;
pub mod ticket_issuer;

#[cfg(test)]
pub mod testing;
