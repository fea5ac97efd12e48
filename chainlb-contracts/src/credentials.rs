use crate::ContractError;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chainlb_core::hex;
use std::fmt;
use std::hash::{Hash, Hasher};

const PRIVATE_KEY_HEX_LEN: usize = 64;

/// 签名凭证
///
/// 由私钥派生的签名器，按地址比较与哈希。`Debug` 只输出地址，不会泄露私钥。
#[derive(Clone)]
pub struct Credentials {
    signer: PrivateKeySigner,
}

impl Credentials {
    pub fn from_private_key(pk: &str) -> Result<Self, ContractError> {
        let prepared = hex::prepare_hex(pk)
            .map_err(|_| ContractError::InvalidPrivateKey("not a hex string".to_string()))?;
        if prepared.len() != PRIVATE_KEY_HEX_LEN {
            return Err(ContractError::InvalidPrivateKey(format!(
                "expected {} hex characters, got {}",
                PRIVATE_KEY_HEX_LEN,
                prepared.len()
            )));
        }

        let signer = prepared
            .parse::<PrivateKeySigner>()
            .map_err(|e| ContractError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { signer })
    }

    /// 使用随机生成的私钥
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// 发送方地址
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Credentials {}

impl Hash for Credentials {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address())
            .finish()
    }
}
