//! Challenge selection and proof headers on an [`HeaderMap`].
//!
//! [`find_challenge`] looks for each [`WireFormat`] in priority order and
//! decodes the first one whose marker is present. For the structured
//! encoding the marker is a `WWW-Authenticate` value using the `x402`
//! scheme, so an unrelated `WWW-Authenticate: Bearer ...` does not hide a
//! legacy `PAYMENT-REQUIRED` header on the same response.

use cash402::proto::WireFormat;
use cash402::{Challenge, ChallengeError};
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::constants::AUTH_SCHEME;
use crate::error::HeaderError;

/// Extracts the challenge from a 402 response's headers.
///
/// # Errors
///
/// Returns [`ChallengeError::NoChallengeHeader`] if no encoding's header is
/// present, or the decoding error of the selected encoding.
pub fn find_challenge(headers: &HeaderMap) -> Result<(WireFormat, Challenge), ChallengeError> {
    let mut unrecognized = None;
    for format in WireFormat::PRIORITY {
        let mut values = headers.get_all(format.challenge_header()).iter().peekable();
        if values.peek().is_none() {
            continue;
        }
        let selected = match format {
            WireFormat::Authenticate => {
                let mut x402 = None;
                for value in values {
                    if value.as_bytes().starts_with(AUTH_SCHEME.as_bytes()) {
                        x402 = Some(value);
                        break;
                    }
                    unrecognized.get_or_insert(value);
                }
                x402
            }
            WireFormat::Legacy => values.next(),
        };
        if let Some(value) = selected {
            let value = value
                .to_str()
                .map_err(|_| ChallengeError::InvalidHeaderValue)?;
            return format.decode(value).map(|challenge| (format, challenge));
        }
    }
    match unrecognized {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ChallengeError::InvalidHeaderValue)?;
            WireFormat::Authenticate
                .decode(value)
                .map(|challenge| (WireFormat::Authenticate, challenge))
        }
        None => Err(ChallengeError::NoChallengeHeader),
    }
}

/// Writes `pairs` into `headers`, replacing any existing values of the same name.
///
/// # Errors
///
/// Returns [`HeaderError`] if a name or value is not valid in HTTP; nothing is
/// written in that case.
pub fn insert_all(
    headers: &mut HeaderMap,
    pairs: Vec<(&'static str, String)>,
) -> Result<(), HeaderError> {
    let mut parsed = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())?;
        let header_value = HeaderValue::from_str(&value).map_err(|_| HeaderError::Value(name))?;
        parsed.push((header_name, header_value));
    }
    for (name, value) in parsed {
        headers.insert(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn legacy(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn test_no_challenge_header() {
        assert_eq!(
            find_challenge(&HeaderMap::new()),
            Err(ChallengeError::NoChallengeHeader)
        );
    }

    #[test]
    fn test_legacy_header_is_case_insensitive() {
        let map = headers(&[(
            "payment-required",
            &legacy(r#"{"amount":546,"address":"addr1","token":"jwtX"}"#),
        )]);
        let (format, challenge) = find_challenge(&map).unwrap();
        assert_eq!(format, WireFormat::Legacy);
        assert_eq!(challenge.amount, 546);
        assert_eq!(challenge.token.as_deref(), Some("jwtX"));
    }

    #[test]
    fn test_authenticate_wins_over_legacy() {
        let map = headers(&[
            (
                "www-authenticate",
                r#"x402 network="bch", address="bchtest:abc", amount="1000", asset="bch", token="tok123""#,
            ),
            (
                "payment-required",
                &legacy(r#"{"amount":546,"address":"addr1","token":"jwtX"}"#),
            ),
        ]);
        let (format, challenge) = find_challenge(&map).unwrap();
        assert_eq!(format, WireFormat::Authenticate);
        assert_eq!(challenge.address, "bchtest:abc");
        assert_eq!(challenge.amount, 1000);
    }

    #[test]
    fn test_foreign_authenticate_scheme_falls_through_to_legacy() {
        let map = headers(&[
            ("www-authenticate", r#"Bearer realm="api""#),
            (
                "payment-required",
                &legacy(r#"{"amount":546,"address":"addr1"}"#),
            ),
        ]);
        let (format, _) = find_challenge(&map).unwrap();
        assert_eq!(format, WireFormat::Legacy);
    }

    #[test]
    fn test_x402_value_found_among_several() {
        let map = headers(&[
            ("www-authenticate", r#"Bearer realm="api""#),
            ("www-authenticate", r#"x402 address="a", amount="5""#),
        ]);
        let (format, challenge) = find_challenge(&map).unwrap();
        assert_eq!(format, WireFormat::Authenticate);
        assert_eq!(challenge.amount, 5);
    }

    #[test]
    fn test_foreign_authenticate_scheme_alone_is_malformed() {
        let map = headers(&[("www-authenticate", r#"Bearer realm="api""#)]);
        assert_eq!(find_challenge(&map), Err(ChallengeError::UnknownScheme));
    }

    #[test]
    fn test_malformed_legacy() {
        let map = headers(&[("payment-required", "!!!not-base64!!!")]);
        assert!(matches!(
            find_challenge(&map),
            Err(ChallengeError::Base64(_))
        ));
    }

    #[test]
    fn test_insert_all_replaces_and_validates() {
        let mut map = headers(&[("authorization", "Bearer old")]);
        insert_all(
            &mut map,
            vec![("Authorization", "x402 tok:tx".to_owned())],
        )
        .unwrap();
        assert_eq!(map.get_all("authorization").iter().count(), 1);
        assert_eq!(map["authorization"], "x402 tok:tx");

        let err = insert_all(
            &mut map,
            vec![
                ("X-PAYMENT", "ok".to_owned()),
                ("X-CashApi-Token", "bad\nvalue".to_owned()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, HeaderError::Value("X-CashApi-Token")));
        assert!(map.get("x-payment").is_none());
    }
}
