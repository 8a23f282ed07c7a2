//! Amino-JSON transaction documents exchanged with the LCD.
//!
//! The signature covers the exact bytes of the canonical sign document: keys
//! sorted at every level, no whitespace, and `<`, `>`, `&` escaped the way the
//! chain's JSON encoder does it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Public key type tag for secp256k1 keys
pub const PUBKEY_SECP256K1_TYPE: &str = "tendermint/PubKeySecp256k1";

/// Amount of one denomination. Amino encodes integers as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

/// Sort coins by denomination, the chain's canonical coin order
pub fn sort_coins(coins: &mut [Coin]) {
    coins.sort_by(|a, b| a.denom.cmp(&b.denom));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: String,
}

/// A message as carried in the transaction: amino type tag plus body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxMsg {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl TxMsg {
    /// Bank transfers (`cosmos-sdk/MsgSend`, `pay/MsgSend`, ...)
    pub fn is_send(&self) -> bool {
        self.kind.ends_with("MsgSend")
    }

    /// Put the transfer's amount list into canonical order.
    pub fn sort_amounts(&mut self) -> Result<(), serde_json::Error> {
        if !self.is_send() {
            return Ok(());
        }
        if let Some(amount) = self.value.get_mut("amount") {
            let mut coins: Vec<Coin> = serde_json::from_value(amount.take())?;
            sort_coins(&mut coins);
            *amount = serde_json::to_value(coins)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub kind: String,
    /// base64 of the compressed SEC1 point
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: PubKey,
    /// base64 of the 64-byte `r || s` signature
    pub signature: String,
}

/// Standard transaction; `signatures` is null until signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdTx {
    pub msg: Vec<TxMsg>,
    pub fee: StdFee,
    #[serde(default)]
    pub signatures: Option<Vec<StdSignature>>,
    #[serde(default)]
    pub memo: String,
}

impl StdTx {
    pub fn sort_amounts(&mut self) -> Result<(), serde_json::Error> {
        self.msg.iter_mut().try_for_each(TxMsg::sort_amounts)
    }
}

/// The document a signature commits to
#[derive(Debug, Clone, Serialize)]
pub struct StdSignDoc<'a> {
    pub account_number: String,
    pub chain_id: &'a str,
    pub fee: &'a StdFee,
    pub memo: &'a str,
    pub msgs: &'a [TxMsg],
    pub sequence: String,
}

impl<'a> StdSignDoc<'a> {
    pub fn new(tx: &'a StdTx, chain_id: &'a str, account_number: u64, sequence: u64) -> Self {
        Self {
            account_number: account_number.to_string(),
            chain_id,
            fee: &tx.fee,
            memo: &tx.memo,
            msgs: &tx.msg,
            sequence: sequence.to_string(),
        }
    }

    /// Canonical bytes to sign
    pub fn to_sign_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let value = canonical_json(serde_json::to_value(self)?);
        let json = serde_json::to_string(&value)?;
        Ok(escape_html(&json).into_bytes())
    }
}

/// Rebuild `value` with object keys sorted at every depth
pub fn canonical_json(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonical_json(value)))
                .collect();
            Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_json).collect()),
        other => other,
    }
}

// These characters only ever occur inside JSON strings.
fn escape_html(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unsigned_tx() -> StdTx {
        serde_json::from_value(json!({
            "msg": [{
                "type": "cosmos-sdk/MsgSend",
                "value": {
                    "from_address": "terra1faucet",
                    "to_address": "terra1user",
                    "amount": [
                        {"denom": "uusd", "amount": "10"},
                        {"denom": "ukrw", "amount": "20"},
                        {"denom": "uluna", "amount": "30"}
                    ]
                }
            }],
            "fee": {"amount": [{"denom": "uluna", "amount": "10"}], "gas": "200000"},
            "signatures": null,
            "memo": "faucet"
        }))
        .unwrap()
    }

    #[test]
    fn test_sort_amounts() {
        let mut tx = unsigned_tx();
        tx.sort_amounts().unwrap();

        let denoms: Vec<_> = tx.msg[0].value["amount"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["denom"].as_str().unwrap())
            .collect();
        assert_eq!(denoms, ["ukrw", "uluna", "uusd"]);
    }

    #[test]
    fn test_non_send_messages_untouched() {
        let mut msg = TxMsg {
            kind: "market/MsgSwap".to_string(),
            value: json!({"amount": "not a coin list"}),
        };
        msg.sort_amounts().unwrap();
        assert_eq!(msg.value["amount"], "not a coin list");
    }

    #[test]
    fn test_sign_bytes_are_canonical() {
        let mut tx = unsigned_tx();
        tx.sort_amounts().unwrap();
        let bytes = StdSignDoc::new(&tx, "soju-0007", 42, 7).to_sign_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with(r#"{"account_number":"42","chain_id":"soju-0007","fee":{"amount":[{"amount":"10","denom":"uluna"}],"gas":"200000"},"memo":"faucet","msgs":[{"type":"cosmos-sdk/MsgSend","value":{"amount":[{"amount":"20","denom":"ukrw"}"#));
        assert!(text.ends_with(r#""sequence":"7"}"#));
        assert!(!text.contains(' '));
    }

    #[test]
    fn test_sign_bytes_escape_html() {
        let mut tx = unsigned_tx();
        tx.memo = "<a&b>".to_string();
        let bytes = StdSignDoc::new(&tx, "soju-0007", 0, 0).to_sign_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""memo":"\u003ca\u0026b\u003e""#));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = canonical_json(json!({"b": {"z": 1, "a": [{"y": 1, "x": 2}]}, "a": 0}));
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":0,"b":{"a":[{"x":2,"y":1}],"z":1}}"#
        );
    }
}
