use crate::ResourceId;
use std::fmt;

/// A validated TLS certificate and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub id: ResourceId,

    /// PEM encoded certificate chain.
    pub certificate_chain: Vec<u8>,

    /// PEM encoded private key.
    pub private_key: Vec<u8>,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("certificate_chain_len", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}
