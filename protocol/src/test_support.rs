//! Shared fixtures for unit tests.

use std::path::PathBuf;
use std::sync::Arc;

use rsa::RsaPrivateKey;

use crate::crypto::keys::load_private_key;
use crate::gateway::Gateway;
use crate::registry::{BankConfig, BankConfigRegistry};
use crate::simulator::BankSimulator;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Signs requests with `merchant_key.pem`, verifies with `bank_pub.pem`.
pub fn swedbank() -> BankConfig {
    BankConfig::ipizza(
        "swedbank",
        "https://banklink.example/swedbank",
        "uid100052",
        "HP",
        fixture("merchant_key.pem"),
        fixture("bank_pub.pem"),
    )
}

pub fn nordea_bank() -> BankConfig {
    BankConfig::nordea(
        "nordea",
        "https://netbank.nordea.example/eid.jsp",
        "87654321",
        "LEHTI",
    )
}

pub fn merchant_private_key() -> RsaPrivateKey {
    load_private_key("swedbank", &fixture("merchant_key.pem")).unwrap()
}

pub fn bank_private_key() -> RsaPrivateKey {
    load_private_key("swedbank", &fixture("bank_key.pem")).unwrap()
}

pub fn gateway_with(banks: Vec<BankConfig>) -> Gateway {
    Gateway::in_memory(Arc::new(BankConfigRegistry::new(banks).unwrap()))
}

pub fn gateway() -> Gateway {
    gateway_with(vec![swedbank(), nordea_bank()])
}

/// The bank side of `swedbank()`.
pub fn swedbank_simulator() -> BankSimulator {
    BankSimulator::new(bank_private_key(), "HP", "uid100052")
}
