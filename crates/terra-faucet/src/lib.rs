//! Terra Faucet Server - testnet faucet dispensing small amounts of each
//! supported denomination.
//!
//! A claim passes through the following steps:
//! 1. The bech32 address and denomination are validated and the reCAPTCHA
//!    response is checked
//! 2. The rate-limit ledger admits the claim and records it durably
//! 3. Under the sequence lock, the faucet's sequence is refreshed, an unsigned
//!    transfer is built by the LCD, signed locally and broadcast
//! 4. The sequence advances only when the broadcast succeeds

pub mod address;
pub mod broadcast;
pub mod captcha;
pub mod config;
pub mod denom;
pub mod drip;
pub mod error;
pub mod http;
pub mod lcd;
pub mod ledger;
pub mod sequence;
pub mod signer;
pub mod tx;

pub use config::FaucetConfig;
pub use drip::{Claim, DripService};
pub use error::{FaucetError, FaucetResult};
