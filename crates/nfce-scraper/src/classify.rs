//! Recognizes portal error pages.
//!
//! The portal answers most failures with a 200 page carrying a message.
//! [`classify`] matches the page text against an ordered pattern table,
//! then checks whether the captcha form was rendered again.

use crate::endpoints::FIELD_CAPTCHA;
use scraper::Html;

/// Kind of failure reported by a portal page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalErrorKind {
    /// The key was rejected by the portal
    InvalidAccessKey,
    /// No receipt exists for the key
    InvoiceNotFound,
    /// The captcha answer was wrong
    InvalidCaptcha,
    /// The server session is gone
    SessionExpired,
    /// Server-side failure page
    Unexpected,
}

/// Lower-case substrings, checked in order.
const PATTERNS: &[(&str, PortalErrorKind)] = &[
    ("chave de acesso inválida", PortalErrorKind::InvalidAccessKey),
    ("nfc-e não encontrada", PortalErrorKind::InvoiceNotFound),
    ("captcha inválido", PortalErrorKind::InvalidCaptcha),
    ("código de segurança inválido", PortalErrorKind::InvalidCaptcha),
    ("código incorreto tente novamente", PortalErrorKind::InvalidCaptcha),
    ("sessão expirada", PortalErrorKind::SessionExpired),
    ("sessão expirou", PortalErrorKind::SessionExpired),
    ("object reference not set to an instance of an object", PortalErrorKind::Unexpected),
    ("ocorreu um erro", PortalErrorKind::Unexpected),
];

/// Classify a response body. `None` means the page is not an error page.
#[must_use]
pub fn classify(page: &[u8]) -> Option<PortalErrorKind> {
    let document = Html::parse_document(&String::from_utf8_lossy(page));
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some((pattern, kind)) = PATTERNS.iter().find(|(pattern, _)| text.contains(pattern)) {
        tracing::debug!("Portal page matched error pattern {:?}", pattern);
        return Some(*kind);
    }

    let captcha_input = document
        .select(selector!("input[name]"))
        .any(|input| input.value().attr("name") == Some(FIELD_CAPTCHA));
    if captcha_input {
        tracing::debug!("Portal rendered the captcha form again");
        return Some(PortalErrorKind::InvalidCaptcha);
    }

    None
}
