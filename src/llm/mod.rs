//! Clients for the local model host: streaming generation, the model
//! catalog, and the cross-encoder rerank sidecar.

pub mod cross_encoder;
pub mod generate;
