use std::fmt::Debug;
use std::marker::PhantomData;

use libmdbx::orm::{Decodable, Encodable};
use streamer_rlp::{decode::RLPDecode, encode::RLPEncode};

use crate::error::StoreError;

/// Wraps an RLP-encoded value for storage in an mdbx table, the same way the rollup
/// store's `Rlp<T>` wrapper does for L2 batch metadata.
#[derive(Clone)]
pub struct RlpValue<T>(Vec<u8>, PhantomData<T>);

impl<T: RLPEncode> From<T> for RlpValue<T> {
    fn from(value: T) -> Self {
        Self(value.encode_to_vec(), PhantomData)
    }
}

impl<T> RlpValue<T> {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes, PhantomData)
    }
}

impl<T: RLPDecode> RlpValue<T> {
    pub fn decode(&self) -> Result<T, StoreError> {
        Ok(T::decode(&self.0)?)
    }
}

impl<T> Debug for RlpValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RlpValue").field(&self.0).finish()
    }
}

impl<T: Debug + Send + Sync> Encodable for RlpValue<T> {
    type Encoded = Vec<u8>;

    fn encode(self) -> Self::Encoded {
        self.0
    }
}

impl<T: Debug + Send + Sync> Decodable for RlpValue<T> {
    fn decode(b: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::from_bytes(b.to_vec()))
    }
}
