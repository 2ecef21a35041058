// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire format of the host bridge channel.
//
// One JSON object per line in each direction. The host sends
// `{"id", "method", "params"}` requests; Kasse answers each id exactly once
// with `{"id", "result"}` or `{"id", "error"}`, and interleaves
// `{"event", "payload"}` notifications for transaction updates.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use kasse_core::bridge_errors::BridgeError;
use kasse_core::error::{KasseError, Result};
use kasse_core::types::{ProductId, TransactionEvent, TransactionId};

/// A request the host can make.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(
    tag = "method",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum HostCall {
    LoadProducts {
        product_identifiers: Vec<ProductId>,
    },
    CanMakePayments,
    PurchaseProduct {
        product_identifier: ProductId,
        #[serde(default)]
        quantity: Option<u32>,
    },
    PurchaseProductForUser {
        product_identifier: ProductId,
        username: String,
        #[serde(default)]
        quantity: Option<u32>,
    },
    RestorePurchases,
    RestorePurchasesForUser {
        username: String,
    },
    ReceiptData,
    ShouldFinishTransactions {
        finish_transactions: bool,
    },
    FinishCurrentTransaction,
    ClearCompletedTransactions,
    FinishTransaction {
        transaction_identifier: TransactionId,
    },
    PendingRequests,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Call { id: u64, call: HostCall },
    /// `id` is present when it could be read, so the host can be told.
    Malformed { id: Option<u64>, reason: String },
}

pub fn parse_line(line: &str) -> Inbound {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            return Inbound::Malformed {
                id: None,
                reason: format!("not a request object: {e}"),
            };
        }
    };
    let Some(id) = envelope.id else {
        return Inbound::Malformed {
            id: None,
            reason: "request has no id".into(),
        };
    };
    let Some(method) = envelope.method else {
        return Inbound::Malformed {
            id: Some(id),
            reason: "request has no method".into(),
        };
    };

    // Parameterless calls may send no params, null, or an empty object.
    let omit_params = match &envelope.params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    let tagged = if omit_params {
        json!({ "method": method })
    } else {
        json!({ "method": method, "params": envelope.params })
    };

    match serde_json::from_value(tagged) {
        Ok(call) => Inbound::Call { id, call },
        Err(e) => Inbound::Malformed {
            id: Some(id),
            reason: format!("invalid {method} request: {e}"),
        },
    }
}

/// Decode one raw line read from the host. Blank lines yield `None`.
pub fn decode_line(bytes: &[u8]) -> Option<Inbound> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Some(Inbound::Malformed {
            id: None,
            reason: "request line is not valid UTF-8".into(),
        });
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(parse_line(text))
}

/// The single answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl Reply {
    pub fn ok<T: Serialize>(id: u64, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => Self {
                id,
                result: Some(result),
                error: None,
            },
            Err(e) => Self::err(id, &KasseError::Serialization(e)),
        }
    }

    pub fn err(id: u64, error: &KasseError) -> Self {
        Self {
            id,
            result: None,
            error: Some(BridgeError::from(error)),
        }
    }

    pub fn malformed(id: u64, reason: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(BridgeError::malformed(reason)),
        }
    }

    pub fn from_result<T: Serialize>(id: u64, result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(id, value),
            Err(e) => Self::err(id, &e),
        }
    }
}

/// Unsolicited notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    TransactionUpdated(TransactionEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasse_core::types::{TransactionRecord, TransactionState};

    fn call(line: &str) -> HostCall {
        match parse_line(line) {
            Inbound::Call { call, .. } => call,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn parses_calls_with_params() {
        assert_eq!(
            call(r#"{"id":1,"method":"loadProducts","params":{"productIdentifiers":["a","b"]}}"#),
            HostCall::LoadProducts {
                product_identifiers: vec![ProductId::from("a"), ProductId::from("b")]
            }
        );
        assert_eq!(
            call(r#"{"id":2,"method":"purchaseProductForUser","params":{"productIdentifier":"a","username":"u","quantity":2}}"#),
            HostCall::PurchaseProductForUser {
                product_identifier: ProductId::from("a"),
                username: "u".into(),
                quantity: Some(2),
            }
        );
        assert_eq!(
            call(r#"{"id":3,"method":"purchaseProduct","params":{"productIdentifier":"a"}}"#),
            HostCall::PurchaseProduct {
                product_identifier: ProductId::from("a"),
                quantity: None,
            }
        );
    }

    #[test]
    fn parameterless_calls_accept_any_empty_params() {
        assert_eq!(call(r#"{"id":1,"method":"restorePurchases"}"#), HostCall::RestorePurchases);
        assert_eq!(call(r#"{"id":1,"method":"receiptData","params":null}"#), HostCall::ReceiptData);
        assert_eq!(
            call(r#"{"id":1,"method":"canMakePayments","params":{}}"#),
            HostCall::CanMakePayments
        );
    }

    #[test]
    fn malformed_lines_keep_the_id_when_readable() {
        assert!(matches!(parse_line("garbage"), Inbound::Malformed { id: None, .. }));
        assert!(matches!(
            parse_line(r#"{"method":"receiptData"}"#),
            Inbound::Malformed { id: None, .. }
        ));
        assert!(matches!(
            parse_line(r#"{"id":9,"method":"sellEverything"}"#),
            Inbound::Malformed { id: Some(9), .. }
        ));
        assert!(matches!(
            parse_line(r#"{"id":10,"method":"purchaseProduct","params":{"quantity":1}}"#),
            Inbound::Malformed { id: Some(10), .. }
        ));
    }

    #[test]
    fn raw_lines_are_decoded_or_skipped() {
        assert!(decode_line(b"  \r\n").is_none());
        assert!(matches!(
            decode_line(b"\xff\xfe\n"),
            Some(Inbound::Malformed { id: None, .. })
        ));
        assert!(matches!(
            decode_line(b"{\"id\":1,\"method\":\"canMakePayments\"}\r\n"),
            Some(Inbound::Call {
                id: 1,
                call: HostCall::CanMakePayments
            })
        ));
    }

    #[test]
    fn replies_carry_either_result_or_error() {
        let ok = serde_json::to_value(Reply::ok(4, true)).unwrap();
        assert_eq!(ok, json!({"id": 4, "result": true}));

        let err = serde_json::to_value(Reply::err(5, &KasseError::Cancelled)).unwrap();
        assert_eq!(err["id"], 5);
        assert_eq!(err["error"]["code"], "cancelled");
        assert!(err.get("result").is_none());
    }

    #[test]
    fn unit_results_serialise_as_null() {
        let reply = serde_json::to_value(Reply::ok(6, ())).unwrap();
        assert_eq!(reply, json!({"id": 6, "result": null}));
    }

    #[test]
    fn events_are_tagged_with_their_name() {
        let event = TransactionRecord::new("t1", "com.app.pro", TransactionState::Purchased).event();
        let value = serde_json::to_value(HostEvent::TransactionUpdated(event)).unwrap();
        assert_eq!(value["event"], "transactionUpdated");
        assert_eq!(value["payload"]["transactionId"], "t1");
        assert_eq!(value["payload"]["state"], "purchased");
    }
}
