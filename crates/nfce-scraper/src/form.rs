//! Hidden postback tokens of web-forms pages.
//!
//! Every render of a portal page embeds `__VIEWSTATE` and friends; the next
//! POST must echo them back or the server discards the request.
//!
//! Pages are decoded lossily: the tokens are ASCII, and stray Latin-1 bytes
//! elsewhere in the portal's markup must not break the postback chain.

use scraper::{Html, Selector};
use std::collections::BTreeMap;
use thiserror::Error;

/// `__VIEWSTATE`
pub const VIEW_STATE: &str = "__VIEWSTATE";
/// `__VIEWSTATEGENERATOR`
pub const VIEW_STATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
/// `__EVENTVALIDATION`
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";
/// `__LASTFOCUS`
pub const LAST_FOCUS: &str = "__LASTFOCUS";
/// `__EVENTTARGET`
pub const EVENT_TARGET: &str = "__EVENTTARGET";
/// `__EVENTARGUMENT`
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

/// Errors from decoding or querying a page.
#[derive(Debug, Error)]
pub enum FormError {
    /// Page carries no view-state, so it cannot be posted back
    #[error("page has no __VIEWSTATE token")]
    MissingViewState,

    /// CSS selector could not be parsed
    #[error("invalid selector {selector:?}: {reason}")]
    Selector {
        /// The selector text
        selector: String,
        /// Parser message
        reason: String,
    },
}

/// Tokens captured from one page render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    /// `__VIEWSTATE`
    pub view_state: String,
    /// `__VIEWSTATEGENERATOR`
    pub view_state_generator: String,
    /// `__EVENTVALIDATION`
    pub event_validation: String,
    /// `__LASTFOCUS`
    pub last_focus: String,
    /// `__EVENTTARGET`
    pub event_target: String,
    /// `__EVENTARGUMENT`
    pub event_argument: String,
}

impl FormState {
    /// Read the hidden inputs of a page. Missing inputs decode as empty.
    #[must_use]
    pub fn decode(page: &[u8]) -> Self {
        let document = Html::parse_document(&String::from_utf8_lossy(page));

        let mut state = Self::default();
        for input in document.select(selector!("input[name]")) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            let slot = match name {
                VIEW_STATE => &mut state.view_state,
                VIEW_STATE_GENERATOR => &mut state.view_state_generator,
                EVENT_VALIDATION => &mut state.event_validation,
                LAST_FOCUS => &mut state.last_focus,
                EVENT_TARGET => &mut state.event_target,
                EVENT_ARGUMENT => &mut state.event_argument,
                _ => continue,
            };
            if slot.is_empty() {
                *slot = input.value().attr("value").unwrap_or_default().to_string();
            }
        }

        state
    }

    /// Decode and require a view-state.
    pub fn decode_valid(page: &[u8]) -> Result<Self, FormError> {
        let state = Self::decode(page);
        if state.is_valid() {
            Ok(state)
        } else {
            Err(FormError::MissingViewState)
        }
    }

    /// True when the view-state is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.view_state.is_empty()
    }

    /// Fields to post back.
    ///
    /// View-state, generator and event-validation are sent only when set;
    /// the three event fields are always sent, possibly empty.
    #[must_use]
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        for (name, value) in [
            (VIEW_STATE, &self.view_state),
            (VIEW_STATE_GENERATOR, &self.view_state_generator),
            (EVENT_VALIDATION, &self.event_validation),
        ] {
            if !value.is_empty() {
                fields.insert(name.to_string(), value.clone());
            }
        }
        fields.insert(LAST_FOCUS.to_string(), self.last_focus.clone());
        fields.insert(EVENT_TARGET.to_string(), self.event_target.clone());
        fields.insert(EVENT_ARGUMENT.to_string(), self.event_argument.clone());
        fields
    }
}

/// Merges carried tokens with step-specific fields.
///
/// Step fields win over carried tokens on collision.
#[derive(Debug, Clone)]
pub struct FormBuilder<'a> {
    state: &'a FormState,
    fields: BTreeMap<String, String>,
}

impl<'a> FormBuilder<'a> {
    /// Start from the tokens of `state`.
    #[must_use]
    pub fn new(state: &'a FormState) -> Self {
        Self {
            state,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a field only when `condition` holds.
    #[must_use]
    pub fn set_if(self, condition: bool, name: impl Into<String>, value: impl Into<String>) -> Self {
        if condition {
            self.set(name, value)
        } else {
            self
        }
    }

    /// Simulate a click on an `<input type="image">` at `(x, y)`.
    #[must_use]
    pub fn image_button(self, name: &str, x: u32, y: u32) -> Self {
        self.set(format!("{name}.x"), x.to_string())
            .set(format!("{name}.y"), y.to_string())
    }

    /// Final field set.
    #[must_use]
    pub fn build(self) -> BTreeMap<String, String> {
        let mut fields = self.state.to_fields();
        fields.extend(self.fields);
        fields
    }
}

fn parse_selector(selector: &str) -> Result<Selector, FormError> {
    Selector::parse(selector).map_err(|e| FormError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// `action` attribute of the first element matching `selector`.
pub fn form_action(page: &[u8], selector: &str) -> Result<Option<String>, FormError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(&String::from_utf8_lossy(page));
    Ok(document
        .select(&selector)
        .next()
        .and_then(|form| form.value().attr("action"))
        .map(str::to_string))
}

/// True when at least one element matches `selector`.
pub fn has_element(page: &[u8], selector: &str) -> Result<bool, FormError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(&String::from_utf8_lossy(page));
    Ok(document.select(&selector).next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <form method="post" action="./NFCEC_consulta_chave_acesso.aspx" id="form1">
          <input type="hidden" name="__EVENTTARGET" id="__EVENTTARGET" value="" />
          <input type="hidden" name="__EVENTARGUMENT" id="__EVENTARGUMENT" value="" />
          <input type="hidden" name="__LASTFOCUS" id="__LASTFOCUS" value="" />
          <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="dDwtMTI3OTMzNDM4NDs7Pg==" />
          <input type="hidden" name="__VIEWSTATEGENERATOR" value="CA0B0334" />
          <input type="hidden" name="__EVENTVALIDATION" value="/wEdAAOlP1Nd" />
          <input name="txt_chave_acesso" type="text" />
          <input name="txt_cod_antirobo" type="text" />
        </form>"#;

    #[test]
    fn test_decode() {
        let state = FormState::decode(PAGE.as_bytes());
        assert_eq!(state.view_state, "dDwtMTI3OTMzNDM4NDs7Pg==");
        assert_eq!(state.view_state_generator, "CA0B0334");
        assert_eq!(state.event_validation, "/wEdAAOlP1Nd");
        assert!(state.is_valid());
    }

    #[test]
    fn test_decode_missing_fields() {
        let state = FormState::decode(b"<html><body>no form</body></html>");
        assert_eq!(state, FormState::default());
        assert!(!state.is_valid());
        assert!(matches!(
            FormState::decode_valid(b"<html></html>"),
            Err(FormError::MissingViewState)
        ));
    }

    #[test]
    fn test_decode_tolerates_latin1_bytes() {
        let mut page = b"<p>FEIJ".to_vec();
        page.push(0xE3);
        page.extend_from_slice(b"O</p>");
        page.extend_from_slice(PAGE.as_bytes());

        let state = FormState::decode(&page);
        assert_eq!(state.view_state, "dDwtMTI3OTMzNDM4NDs7Pg==");
        assert_eq!(
            form_action(&page, "form").expect("query").as_deref(),
            Some("./NFCEC_consulta_chave_acesso.aspx")
        );
    }

    #[test]
    fn test_to_fields_always_emits_event_fields() {
        let state = FormState {
            view_state: "vs".to_string(),
            ..FormState::default()
        };
        let fields = state.to_fields();

        assert_eq!(fields.get(VIEW_STATE).map(String::as_str), Some("vs"));
        assert!(!fields.contains_key(VIEW_STATE_GENERATOR));
        assert!(!fields.contains_key(EVENT_VALIDATION));
        for name in [LAST_FOCUS, EVENT_TARGET, EVENT_ARGUMENT] {
            assert_eq!(fields.get(name).map(String::as_str), Some(""), "{name}");
        }
    }

    #[test]
    fn test_builder_fields_override_tokens() {
        let state = FormState::decode(PAGE.as_bytes());
        let fields = FormBuilder::new(&state)
            .set("txt_chave_acesso", "2925")
            .set(EVENT_TARGET, "btn_consulta_completa")
            .set_if(false, "skipped", "x")
            .set_if(true, "hd_origem_chamada", "")
            .image_button("btn_aba_produtos", 10, 10)
            .build();

        assert_eq!(fields["txt_chave_acesso"], "2925");
        assert_eq!(fields[EVENT_TARGET], "btn_consulta_completa");
        assert_eq!(fields[VIEW_STATE], "dDwtMTI3OTMzNDM4NDs7Pg==");
        assert_eq!(fields["btn_aba_produtos.x"], "10");
        assert_eq!(fields["btn_aba_produtos.y"], "10");
        assert_eq!(fields["hd_origem_chamada"], "");
        assert!(!fields.contains_key("skipped"));
    }

    #[test]
    fn test_page_helpers() {
        let page = PAGE.as_bytes();
        assert_eq!(
            form_action(page, "form#form1").expect("query"),
            Some("./NFCEC_consulta_chave_acesso.aspx".to_string())
        );
        assert_eq!(form_action(page, "form#other").expect("query"), None);
        assert!(has_element(page, "input[name='txt_cod_antirobo']").expect("query"));
        assert!(!has_element(page, "#NFe").expect("query"));
        assert!(matches!(
            has_element(page, "[[["),
            Err(FormError::Selector { .. })
        ));
    }
}
