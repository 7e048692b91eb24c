//! Signature Module: detached PKCS#7/CMS signing via the ByteRange
//! gap-and-patch technique (spec.md §4.9).

use chrono::Utc;
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::EncapsulatedContentInfo;
use der::{Decode, Encode};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use x509_cert::Certificate;

use crate::error::{Error, Result};
use crate::template::SignatureConfig;

/// Hex digits reserved for `/Contents`, sized to comfortably hold an
/// RSA-4096 CMS blob plus a short chain, per spec.md §4.9's "pad width ≥
/// 8192 hex chars" rule.
pub const CONTENTS_PLACEHOLDER_HEX_LEN: usize = 8192;

/// Literal bytes of the placeholder `/ByteRange` array as `lopdf` will
/// serialize it, wide enough (10-digit offsets, up to ~10GB) that the real
/// numbers always fit within this width once space-padded by
/// `sign_in_place`. `[0 0 0 0]` would be too narrow for any real file
/// offset.
pub const BYTE_RANGE_MARKER: &[u8] = b"[0 9999999999 9999999999 9999999999]";

/// Everything the driver needs to reserve a `/Sig` dictionary with
/// placeholders before the final byte layout is known.
pub struct SignaturePlaceholder {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub signing_time: String,
}

impl SignaturePlaceholder {
    pub fn from_config(config: &SignatureConfig) -> Self {
        SignaturePlaceholder {
            reason: config.reason.clone(),
            location: config.location.clone(),
            name: config.name.clone(),
            signing_time: format_pdf_date(Utc::now()),
        }
    }
}

fn format_pdf_date(dt: chrono::DateTime<Utc>) -> String {
    dt.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Build a `/Sig` dictionary with a zero `/ByteRange` and a zero-filled
/// `/Contents` hex string of `CONTENTS_PLACEHOLDER_HEX_LEN` digits. The
/// driver finalizes the rest of the document, then calls
/// `locate_byte_range_gap` and `sign_in_place` to patch both back in.
pub fn placeholder_sig_dict(placeholder: &SignaturePlaceholder) -> lopdf::Dictionary {
    use lopdf::{Dictionary, Object};
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Sig".to_vec()));
    dict.set("Filter", Object::Name(b"Adobe.PPKLite".to_vec()));
    dict.set("SubFilter", Object::Name(b"adbe.pkcs7.detached".to_vec()));
    dict.set(
        "ByteRange",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(9_999_999_999),
            Object::Integer(9_999_999_999),
            Object::Integer(9_999_999_999),
        ]),
    );
    let placeholder_hex = vec![b'0'; CONTENTS_PLACEHOLDER_HEX_LEN];
    dict.set("Contents", Object::String(placeholder_hex, lopdf::StringFormat::Hexadecimal));
    dict.set("M", Object::String(placeholder.signing_time.as_bytes().to_vec(), lopdf::StringFormat::Literal));
    if let Some(reason) = &placeholder.reason {
        dict.set("Reason", Object::String(reason.as_bytes().to_vec(), lopdf::StringFormat::Literal));
    }
    if let Some(location) = &placeholder.location {
        dict.set("Location", Object::String(location.as_bytes().to_vec(), lopdf::StringFormat::Literal));
    }
    if let Some(name) = &placeholder.name {
        dict.set("Name", Object::String(name.as_bytes().to_vec(), lopdf::StringFormat::Literal));
    }
    dict
}

/// Find the byte offsets of the `/Contents <` hex string's opening `<` and
/// closing `>` within the serialized document, by locating the placeholder
/// run of ASCII `0` digits emitted by `placeholder_sig_dict`.
pub fn locate_byte_range_gap(pdf_bytes: &[u8]) -> Result<(usize, usize)> {
    let needle: Vec<u8> = std::iter::once(b'<')
        .chain(std::iter::repeat(b'0').take(CONTENTS_PLACEHOLDER_HEX_LEN))
        .chain(std::iter::once(b'>'))
        .collect();
    let pos = find_subslice(pdf_bytes, &needle).ok_or_else(|| {
        Error::SigningFailed("could not locate /Contents placeholder in finalized PDF bytes".to_string())
    })?;
    let open = pos; // index of '<'
    let close = pos + needle.len() - 1; // index of '>'
    Ok((open, close))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Overwrite the `/ByteRange` array in place (it was emitted as
/// `BYTE_RANGE_MARKER`, the same byte width regardless of the real numbers
/// as long as they don't overflow the reserved field width) and
/// compute+embed the detached CMS signature over everything except the
/// `/Contents` gap.
pub fn sign_in_place(
    pdf_bytes: &mut Vec<u8>,
    byte_range_marker: &[u8],
    config: &SignatureConfig,
) -> Result<()> {
    let (gap_open, gap_close_inclusive) = locate_byte_range_gap(pdf_bytes)?;
    let gap_close = gap_close_inclusive + 1; // exclusive end, past '>'
    let file_len = pdf_bytes.len();

    let byte_range = format!(
        "[0 {gap_open} {gap_close} {}]",
        file_len - gap_close
    );
    patch_byte_range(pdf_bytes, byte_range_marker, &byte_range)?;

    let mut digest_input = Vec::with_capacity(file_len - (gap_close - gap_open));
    digest_input.extend_from_slice(&pdf_bytes[..gap_open]);
    digest_input.extend_from_slice(&pdf_bytes[gap_close..]);
    let digest = Sha256::digest(&digest_input);

    let cms_der = build_detached_cms(&digest, config)?;
    let hex: String = cms_der.iter().map(|b| format!("{:02X}", b)).collect();
    if hex.len() > CONTENTS_PLACEHOLDER_HEX_LEN {
        return Err(Error::SigningFailed(format!(
            "CMS signature ({} hex chars) exceeds reserved placeholder ({})",
            hex.len(),
            CONTENTS_PLACEHOLDER_HEX_LEN
        )));
    }
    let mut padded_hex = hex.into_bytes();
    padded_hex.resize(CONTENTS_PLACEHOLDER_HEX_LEN, b'0');

    pdf_bytes[gap_open + 1..gap_close - 1].copy_from_slice(&padded_hex);
    Ok(())
}

fn patch_byte_range(pdf_bytes: &mut [u8], marker: &[u8], replacement: &str) -> Result<()> {
    let pos = find_subslice(pdf_bytes, marker)
        .ok_or_else(|| Error::SigningFailed("ByteRange marker not found".to_string()))?;
    let mut padded = replacement.as_bytes().to_vec();
    if padded.len() > marker.len() {
        return Err(Error::SigningFailed("ByteRange value wider than reserved marker".to_string()));
    }
    padded.resize(marker.len(), b' ');
    pdf_bytes[pos..pos + marker.len()].copy_from_slice(&padded);
    Ok(())
}

fn build_detached_cms(digest: &[u8], config: &SignatureConfig) -> Result<Vec<u8>> {
    let key_pem = config
        .private_key_pem
        .as_deref()
        .ok_or_else(|| Error::SigningFailed("signature.enabled is true but no privateKeyPem given".to_string()))?;
    let cert_pem = config
        .certificate_pem
        .as_deref()
        .ok_or_else(|| Error::SigningFailed("signature.enabled is true but no certificatePem given".to_string()))?;

    let private_key = RsaPrivateKey::from_pkcs8_pem(key_pem)
        .map_err(|e| Error::SigningFailed(format!("invalid RSA private key PEM: {e}")))?;
    let signing_key = SigningKey::<Sha256>::new(private_key);

    let cert = Certificate::from_pem(cert_pem.as_bytes())
        .map_err(|e| Error::SigningFailed(format!("invalid certificate PEM: {e}")))?;

    let content = EncapsulatedContentInfo {
        econtent_type: der::oid::db::rfc5911::ID_DATA,
        econtent: None, // detached: the content itself is never embedded
    };

    let signer_info = SignerInfoBuilder::new(
        &signing_key,
        cms::signed_data::SignerIdentifier::IssuerAndSerialNumber(
            cms::cert::IssuerAndSerialNumber {
                issuer: cert.tbs_certificate.issuer.clone(),
                serial_number: cert.tbs_certificate.serial_number.clone(),
            },
        ),
        der::oid::db::rfc5912::ID_SHA_256,
        &content,
        Some(digest.to_vec()),
    )
    .map_err(|e| Error::SigningFailed(format!("building signer info failed: {e:?}")))?;

    let mut builder = SignedDataBuilder::new(&content);
    builder
        .add_digest_algorithm(der::oid::db::rfc5912::ID_SHA_256)
        .map_err(|e| Error::SigningFailed(format!("{e:?}")))?;
    builder
        .add_certificate(CertificateChoices::Certificate(cert))
        .map_err(|e| Error::SigningFailed(format!("{e:?}")))?;
    for chain_pem in &config.chain_pem {
        let chain_cert = Certificate::from_pem(chain_pem.as_bytes())
            .map_err(|e| Error::SigningFailed(format!("invalid chain certificate PEM: {e}")))?;
        builder
            .add_certificate(CertificateChoices::Certificate(chain_cert))
            .map_err(|e| Error::SigningFailed(format!("{e:?}")))?;
    }
    builder
        .add_signer_info(signer_info)
        .map_err(|e| Error::SigningFailed(format!("{e:?}")))?;

    let signed_data = builder
        .build()
        .map_err(|e| Error::SigningFailed(format!("building SignedData failed: {e:?}")))?;

    let content_info = ContentInfo {
        content_type: der::oid::db::rfc5911::ID_SIGNED_DATA,
        content: der::Any::encode_from(&signed_data)
            .map_err(|e| Error::SigningFailed(format!("{e:?}")))?,
    };
    content_info
        .to_der()
        .map_err(|e| Error::SigningFailed(format!("DER encoding CMS ContentInfo failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_sig_dict_has_fixed_width_contents() {
        let ph = SignaturePlaceholder {
            reason: Some("approval".to_string()),
            location: None,
            name: None,
            signing_time: "D:20260101000000+00'00'".to_string(),
        };
        let dict = placeholder_sig_dict(&ph);
        match dict.get(b"Contents").unwrap() {
            lopdf::Object::String(s, _) => assert_eq!(s.len(), CONTENTS_PLACEHOLDER_HEX_LEN),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn test_locate_byte_range_gap() {
        let ph = SignaturePlaceholder {
            reason: None,
            location: None,
            name: None,
            signing_time: "D:20260101000000+00'00'".to_string(),
        };
        let dict = placeholder_sig_dict(&ph);
        let mut bytes = Vec::new();
        dict.save_to(&mut bytes).unwrap();
        let (open, close) = locate_byte_range_gap(&bytes).unwrap();
        assert_eq!(bytes[open], b'<');
        assert_eq!(bytes[close], b'>');
    }

    #[test]
    fn test_find_subslice() {
        assert_eq!(find_subslice(b"hello world", b"world"), Some(6));
        assert_eq!(find_subslice(b"hello world", b"xyz"), None);
    }
}
