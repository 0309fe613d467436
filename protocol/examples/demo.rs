//! Terminal walkthrough of a banklink payment and login.
//!
//! Plays both the shop and the bank: builds a signed payment redirect,
//! answers it with the bank simulator (pingback first, then the shopper's
//! browser), replays a forged answer, and finishes with a Nordea login.
//!
//! Run with:
//!   cargo run --example demo

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal_macros::dec;

use banklink::checksum::reference_number;
use banklink::codec::{encode_form, fields::VK_AMOUNT};
use banklink::config::{auth_callback_url, callback_url, SERVICE_PAYMENT_SUCCESS};
use banklink::crypto::keys::load_private_key;
use banklink::notify::LogNotifier;
use banklink::simulator::{nordea_auth_response, BankSimulator};
use banklink::{
    AuthRequestBuilder, BankConfig, BankConfigRegistry, BanklinkEvent, CallbackReply, Encoding,
    Gateway, PaymentRequestBuilder,
};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    BANKLINK  --  Payment and Login Walkthrough           {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    IPizza (RSA/SHA-1)  |  Nordea (MD5 MAC)               {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]================================================{RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn rejected(text: &str) {
    println!("{RED}  [REJECTED] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn main() {
    tracing_subscriber_init();
    banner();

    // -----------------------------------------------------------------------
    // Step 1: Banks
    // -----------------------------------------------------------------------

    section(1, "Bank registry");
    let registry = BankConfigRegistry::new(vec![
        BankConfig::ipizza(
            "swedbank",
            "https://banklink.example/swedbank",
            "uid100052",
            "HP",
            fixture("merchant_key.pem"),
            fixture("bank_pub.pem"),
        ),
        BankConfig::nordea(
            "nordea",
            "https://netbank.nordea.example/eid.jsp",
            "87654321",
            "LEHTI",
        ),
    ])
    .expect("demo registry");
    for choice in registry.bank_choices() {
        info(&choice.name, &format!("order {}", choice.order));
    }

    let gateway = Gateway::in_memory(Arc::new(registry));
    gateway.notifications().subscribe(Arc::new(LogNotifier));
    gateway.notifications().subscribe(Arc::new(|event: &BanklinkEvent| {
        let (bank, id) = event.subject();
        println!("{DIM}{CYAN}  >> event {} ({bank} #{id}){RESET}", event.name());
    }));
    let t = Instant::now();
    let keys = gateway.preload_keys().expect("fixture keys");
    timing(&format!("{keys} keys parsed"), t.elapsed());

    // -----------------------------------------------------------------------
    // Step 2: Payment request
    // -----------------------------------------------------------------------

    section(2, "Signed payment redirect");
    let t = Instant::now();
    let request = PaymentRequestBuilder::new("swedbank")
        .amount(dec!(13.99))
        .message("My cool payment")
        .return_url(callback_url("http://localhost:8080"))
        .redirect_to("http://localhost:8080/thanks")
        .redirect_on_failure("http://localhost:8080/cart")
        .build(&gateway)
        .expect("payment request");
    timing("build + sign", t.elapsed());

    info("Transaction", &request.transaction.to_string());
    info(
        "Reference",
        &reference_number(request.transaction.id)
            .map(|r| r.to_string())
            .unwrap_or_default(),
    );
    for (name, value) in request.form.fields() {
        let shown = if value.chars().count() > 48 {
            format!("{}...", value.chars().take(48).collect::<String>())
        } else {
            value.clone()
        };
        println!("    {DIM}{name:<12}{RESET} {shown}");
    }

    // -----------------------------------------------------------------------
    // Step 3: The bank answers
    // -----------------------------------------------------------------------

    section(3, "Bank pingback and browser return");
    let bank = BankSimulator::new(
        load_private_key("swedbank", &fixture("bank_key.pem")).expect("bank key"),
        "HP",
        "uid100052",
    );
    let fields = request.form.to_field_map();

    let pingback = bank
        .payment_response(&fields, SERVICE_PAYMENT_SUCCESS, true)
        .and_then(|r| bank.encode(&r))
        .expect("pingback");
    let first = gateway.payment_callback(&pingback).expect("pingback accepted");
    success(&format!("pingback: {:?}, applied={}", first.reply, first.applied));

    let browser = bank
        .payment_response(&fields, SERVICE_PAYMENT_SUCCESS, false)
        .and_then(|r| bank.encode(&r))
        .expect("browser return");
    let second = gateway.payment_callback(&browser).expect("return accepted");
    if let CallbackReply::Redirect(url) = &second.reply {
        success(&format!("browser redirected to {url}, applied={}", second.applied));
    }

    // -----------------------------------------------------------------------
    // Step 4: Forgery
    // -----------------------------------------------------------------------

    section(4, "Tampered response");
    let mut forged = bank
        .payment_response(&fields, SERVICE_PAYMENT_SUCCESS, true)
        .expect("response");
    forged.insert(VK_AMOUNT.to_string(), "0.01".to_string());
    match gateway.payment_callback(&bank.encode(&forged).expect("body")) {
        Ok(_) => println!("{RED}  forged response accepted?!{RESET}"),
        Err(e) => rejected(&e.to_string()),
    }

    // -----------------------------------------------------------------------
    // Step 5: Nordea login
    // -----------------------------------------------------------------------

    section(5, "Nordea e-identification");
    let login = AuthRequestBuilder::new("nordea")
        .return_url(auth_callback_url("http://localhost:8080"))
        .redirect_to("http://localhost:8080/account")
        .build(&gateway)
        .expect("auth request");
    info("Authentication", &login.authentication.to_string());

    let answer = nordea_auth_response(
        &login.form.to_field_map(),
        "LEHTI",
        "Testi Asiakas",
        "010101-123N",
    )
    .expect("nordea answer");
    let body = encode_form(&answer, Encoding::Latin1).expect("latin-1 body");
    let outcome = gateway.auth_callback(body.as_bytes()).expect("login accepted");
    success(&format!(
        "{} ({}) logged in, redirect to {}",
        outcome.user_name.unwrap_or_default(),
        outcome.person_code.unwrap_or_default(),
        outcome.redirect_url
    ));
    println!();
}

/// Logs from the library go to stderr only when `RUST_LOG` asks for them.
fn tracing_subscriber_init() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}
