//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use banklink::crypto::keys::load_private_key;
use banklink::simulator::BankSimulator;
use banklink::{BankConfig, BankConfigRegistry, Gateway};

pub const RETURN_URL: &str = "http://example.com/banks/response/";
pub const AUTH_RETURN_URL: &str = "http://example.com/banks/auth/";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

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

pub fn nordea() -> BankConfig {
    BankConfig::nordea(
        "nordea",
        "https://netbank.nordea.example/eid.jsp",
        "87654321",
        "LEHTI",
    )
}

pub fn registry(banks: Vec<BankConfig>) -> Arc<BankConfigRegistry> {
    Arc::new(BankConfigRegistry::new(banks).expect("valid registry"))
}

pub fn gateway() -> Gateway {
    Gateway::in_memory(registry(vec![swedbank(), nordea()]))
}

/// The bank side of `swedbank()`.
pub fn swedbank_bank() -> BankSimulator {
    let key = load_private_key("swedbank", &fixture("bank_key.pem")).expect("bank key");
    BankSimulator::new(key, "HP", "uid100052")
}
