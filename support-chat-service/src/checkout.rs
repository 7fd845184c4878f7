//! Checkout collaborator contract. The payment flow itself runs on the
//! hosted checkout page; this module only exposes the client bootstrap
//! configuration and the one-shot `payment=` query parameter handling used
//! when the browser returns from checkout.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Cancelled,
}

/// Consume a `payment=success|cancelled` parameter from a raw query string.
///
/// Returns the detected status (if any) and the query string with the
/// parameter removed, so the caller can strip it from the visible URL; the
/// parameter is meant to be observed exactly once.
pub fn payment_status_from_query(query: &str) -> (Option<PaymentStatus>, String) {
    let mut status = None;
    let mut remaining = Vec::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some(("payment", "success")) => status = Some(PaymentStatus::Success),
            Some(("payment", "cancelled")) => status = Some(PaymentStatus::Cancelled),
            // Unknown payment values are dropped along with recognized ones.
            Some(("payment", _)) => {}
            _ => remaining.push(pair),
        }
    }

    (status, remaining.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_cancelled_are_recognized() {
        assert_eq!(
            payment_status_from_query("payment=success"),
            (Some(PaymentStatus::Success), String::new())
        );
        assert_eq!(
            payment_status_from_query("payment=cancelled"),
            (Some(PaymentStatus::Cancelled), String::new())
        );
    }

    #[test]
    fn other_parameters_survive_the_strip() {
        let (status, rest) = payment_status_from_query("utm=x&payment=success&lang=fr");
        assert_eq!(status, Some(PaymentStatus::Success));
        assert_eq!(rest, "utm=x&lang=fr");
    }

    #[test]
    fn absent_or_unknown_values_yield_none() {
        assert_eq!(payment_status_from_query(""), (None, String::new()));
        let (status, rest) = payment_status_from_query("payment=maybe&x=1");
        assert_eq!(status, None);
        assert_eq!(rest, "x=1");
    }
}
